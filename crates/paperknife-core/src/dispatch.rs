//! Worker dispatch channel
//!
//! A [`DispatchChannel`] owns one background thread. Tasks travel to it over
//! a `std::sync::mpsc` queue; each task gets its own reply channel, so a
//! detached task can never leak messages into the next one.
//!
//! At most one task is in flight per channel. The slot is freed when the
//! initiating side observes the terminal message, or when it drops the
//! [`TaskHandle`]. Dropping a handle only detaches it: codec calls are not
//! interruptible, so the worker finishes the task and its output is discarded.

use crate::error::DispatchError;
use crate::payload::TaskPayload;
use crate::protocol::{ProgressEvent, TaskResult, WorkerMessage};
use crate::worker;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

pub const DEFAULT_WORKER_NAME: &str = "paperknife-worker";

const WORKER_EXITED: &str = "background worker exited before completing the task";

struct Envelope {
    task: u64,
    payload: TaskPayload,
    replies: UnboundedSender<WorkerMessage>,
}

pub struct DispatchChannel {
    sender: Option<mpsc::Sender<Envelope>>,
    worker: Option<JoinHandle<()>>,
    in_flight: Arc<AtomicBool>,
    next_task: AtomicU64,
}

impl DispatchChannel {
    pub fn new() -> Result<Self, DispatchError> {
        Self::with_thread_name(DEFAULT_WORKER_NAME)
    }

    /// Start a channel whose worker thread carries `name`
    pub fn with_thread_name(name: &str) -> Result<Self, DispatchError> {
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(receiver))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            in_flight: Arc::new(AtomicBool::new(false)),
            next_task: AtomicU64::new(1),
        })
    }

    /// Ship a task to the worker.
    ///
    /// Fails with [`DispatchError::ConcurrentSubmission`] while an earlier
    /// task's handle is still waiting for its terminal message.
    pub fn submit(&self, payload: TaskPayload) -> Result<TaskHandle, DispatchError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DispatchError::ConcurrentSubmission);
        }

        let task = self.next_task.fetch_add(1, Ordering::Relaxed);
        let kind = payload.kind();
        let (replies, receiver) = unbounded_channel();

        let sent = match &self.sender {
            Some(sender) => sender
                .send(Envelope {
                    task,
                    payload,
                    replies,
                })
                .is_ok(),
            None => false,
        };
        if !sent {
            self.in_flight.store(false, Ordering::Release);
            return Err(DispatchError::WorkerUnavailable);
        }

        debug!("Submitted task {} ({})", task, kind);
        Ok(TaskHandle {
            task,
            receiver,
            in_flight: Arc::clone(&self.in_flight),
            finished: false,
        })
    }

    /// Whether a task is currently outstanding
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Stop accepting tasks and wait for the worker to finish its current one
    pub fn shutdown(mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for DispatchChannel {
    // Does not join: a detached task may still be running
    fn drop(&mut self) {
        self.sender.take();
    }
}

/// The initiating side's view of one submitted task
pub struct TaskHandle {
    task: u64,
    receiver: UnboundedReceiver<WorkerMessage>,
    in_flight: Arc<AtomicBool>,
    finished: bool,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.task
    }

    /// Next message for this task, or `None` after the terminal message.
    ///
    /// A worker that disappears without answering yields a synthetic
    /// `ERROR` instead of hanging.
    pub async fn next(&mut self) -> Option<WorkerMessage> {
        if self.finished {
            return None;
        }

        match self.receiver.recv().await {
            Some(message) => {
                if message.is_terminal() {
                    self.finish();
                }
                Some(message)
            }
            None => {
                self.finish();
                Some(WorkerMessage::Error(WORKER_EXITED.into()))
            }
        }
    }

    pub async fn wait(self) -> TaskResult {
        self.wait_with_progress(|_| {}).await
    }

    /// Wait for the terminal message, passing progress events along the way
    pub async fn wait_with_progress(mut self, mut on_progress: impl FnMut(ProgressEvent)) -> TaskResult {
        while let Some(message) = self.next().await {
            if let WorkerMessage::Progress(percent) = message {
                on_progress(ProgressEvent { percent });
                continue;
            }
            if let Some(result) = TaskResult::from_terminal(message) {
                return result;
            }
        }
        TaskResult::Failure(WORKER_EXITED.into())
    }

    /// Stop listening. The worker still runs the task to completion.
    pub fn detach(self) {}

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.in_flight.store(false, Ordering::Release);
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Task {} detached before completion", self.task);
            self.finish();
        }
    }
}

fn worker_loop(tasks: mpsc::Receiver<Envelope>) {
    while let Ok(Envelope {
        task,
        payload,
        replies,
    }) = tasks.recv()
    {
        debug!("Worker picked up task {} ({})", task, payload.kind());

        let terminal = panic::catch_unwind(AssertUnwindSafe(|| {
            worker::execute(payload, |percent| {
                // A closed reply channel just means the handle was detached
                let _ = replies.send(WorkerMessage::Progress(percent));
            })
        }))
        .unwrap_or_else(|panic| {
            WorkerMessage::Error(format!("Worker panicked: {}", panic_message(panic.as_ref())))
        });

        if replies.send(terminal).is_err() {
            debug!("Task {} finished after its handle was dropped", task);
        }
    }
    debug!("Dispatch channel closed, worker exiting");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
