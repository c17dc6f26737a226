//! Phase tracking and result ownership shared by every tool session

use crate::error::SessionError;
use paperknife_core::{
    ActivityLog, Completion, DispatchChannel, DispatchError, ProgressEvent, ResourceHandle,
    ResultMaterializer, TaskPayload, TaskResult, ToolKind, ToolkitConfig, TransferBuffer,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Empty,
    FilesStaged,
    Processing,
    Succeeded,
    Failed,
}

/// Materialized result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutput {
    Single(ResourceHandle),
    Batch(Vec<ResourceHandle>),
}

impl SessionOutput {
    pub fn handles(&self) -> Vec<&ResourceHandle> {
        match self {
            SessionOutput::Single(handle) => vec![handle],
            SessionOutput::Batch(handles) => handles.iter().collect(),
        }
    }

    pub fn total_size(&self) -> usize {
        self.handles().iter().map(|h| h.size_bytes()).sum()
    }
}

/// Activity log shared between the sessions of one application
pub type SharedActivityLog = Arc<Mutex<ActivityLog>>;

/// Activity log sized by `config.activity_retention`
pub fn shared_activity_log(config: &ToolkitConfig) -> SharedActivityLog {
    Arc::new(Mutex::new(ActivityLog::from_config(config)))
}

pub type ProgressListener = Box<dyn FnMut(ProgressEvent) + Send>;

/// Channel, materializer and phase bookkeeping owned by one session.
///
/// The session owns the channel; dropping the session drops the channel and
/// releases every handle it materialized.
pub(crate) struct SessionCore {
    channel: Option<DispatchChannel>,
    materializer: ResultMaterializer,
    config: ToolkitConfig,
    activity: Option<SharedActivityLog>,
    listener: Option<ProgressListener>,
    phase: Phase,
    output: Option<SessionOutput>,
    error: Option<String>,
    progress: u8,
}

impl SessionCore {
    pub(crate) fn new(config: ToolkitConfig) -> Result<Self, SessionError> {
        let channel = DispatchChannel::with_thread_name(&config.worker_thread_name)?;
        let mut core = Self::without_channel(config);
        core.channel = Some(channel);
        Ok(core)
    }

    /// For tools that run off the dispatch channel
    pub(crate) fn without_channel(config: ToolkitConfig) -> Self {
        Self {
            channel: None,
            materializer: ResultMaterializer::new(config.handle_scheme.clone()),
            config,
            activity: None,
            listener: None,
            phase: Phase::Empty,
            output: None,
            error: None,
            progress: 0,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn output(&self) -> Option<&SessionOutput> {
        self.output.as_ref()
    }

    pub(crate) fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn progress(&self) -> u8 {
        self.progress
    }

    pub(crate) fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    pub(crate) fn set_activity_log(&mut self, log: SharedActivityLog) {
        self.activity = Some(log);
    }

    pub(crate) fn set_progress_listener(&mut self, listener: ProgressListener) {
        self.listener = Some(listener);
    }

    pub(crate) fn ensure(&self, action: &'static str, allowed: &[Phase]) -> Result<(), SessionError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                action,
                phase: self.phase,
            })
        }
    }

    /// Phase after the staged inputs changed
    pub(crate) fn staged(&mut self, remaining: usize) {
        self.revoke_output();
        self.error = None;
        self.progress = 0;
        self.phase = if remaining == 0 {
            Phase::Empty
        } else {
            Phase::FilesStaged
        };
    }

    /// Submit a payload and wait for its terminal message
    pub(crate) async fn dispatch(
        &mut self,
        payload: TaskPayload,
        tool: ToolKind,
        name: &str,
    ) -> Result<&SessionOutput, SessionError> {
        let channel = self
            .channel
            .as_ref()
            .ok_or(DispatchError::WorkerUnavailable)?;
        let handle = channel.submit(payload)?;
        self.begin();

        let progress = &mut self.progress;
        let listener = &mut self.listener;
        let result = handle
            .wait_with_progress(|event| {
                *progress = event.percent;
                if let Some(listener) = listener.as_mut() {
                    listener(event);
                }
            })
            .await;

        self.complete(result, tool, name)
    }

    pub(crate) fn begin(&mut self) {
        self.revoke_output();
        self.error = None;
        self.progress = 0;
        self.phase = Phase::Processing;
    }

    pub(crate) fn complete(
        &mut self,
        result: TaskResult,
        tool: ToolKind,
        name: &str,
    ) -> Result<&SessionOutput, SessionError> {
        let output = match result {
            TaskResult::Success(buffer) => {
                SessionOutput::Single(self.materializer.materialize(buffer, name))
            }
            TaskResult::SuccessBatch(outputs) => SessionOutput::Batch(
                outputs
                    .into_iter()
                    .map(|output| self.materializer.materialize(output.buffer, &output.name))
                    .collect(),
            ),
            TaskResult::Failure(message) => return Err(self.fail(message)),
        };

        info!(
            "{:?} succeeded: {} output(s), {} bytes",
            tool,
            output.handles().len(),
            output.total_size()
        );
        self.record(&output, tool);
        self.phase = Phase::Succeeded;
        self.progress = 100;
        Ok(self.output.insert(output))
    }

    /// Materialize bytes produced outside the dispatch channel
    pub(crate) fn complete_with_bytes(
        &mut self,
        bytes: Vec<u8>,
        tool: ToolKind,
        name: &str,
    ) -> Result<&SessionOutput, SessionError> {
        self.complete(TaskResult::Success(TransferBuffer::new(bytes)), tool, name)
    }

    /// Move to `Failed`, keeping the message for display
    pub(crate) fn fail(&mut self, message: String) -> SessionError {
        warn!("Operation failed: {}", message);
        self.phase = Phase::Failed;
        self.error = Some(message.clone());
        SessionError::TaskFailed(message)
    }

    pub(crate) fn resolve(&self, handle: &ResourceHandle) -> Result<&[u8], SessionError> {
        Ok(self.materializer.resolve(handle)?)
    }

    pub(crate) fn live_handles(&self) -> usize {
        self.materializer.live_count()
    }

    /// Back to `Empty`, releasing every handle
    pub(crate) fn reset(&mut self) {
        if self.phase == Phase::Processing {
            warn!("Resetting while a task is running; its result will be discarded");
        }
        self.output = None;
        self.materializer.release_all();
        self.error = None;
        self.progress = 0;
        self.phase = Phase::Empty;
    }

    fn revoke_output(&mut self) {
        if let Some(output) = self.output.take() {
            for handle in output.handles() {
                self.materializer.release(handle);
            }
        }
    }

    fn record(&self, output: &SessionOutput, tool: ToolKind) {
        let Some(activity) = &self.activity else {
            return;
        };
        let mut log = match activity.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        for handle in output.handles() {
            log.record_completion(Completion {
                name: handle.name().to_string(),
                tool,
                size_bytes: handle.size_bytes(),
                result_url: Some(handle.url().to_string()),
            });
        }
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        self.output = None;
        self.materializer.release_all();
    }
}

/// `"{stem}.pdf"`
pub(crate) fn pdf_name(stem: &str) -> String {
    format!("{}.pdf", stem)
}

/// File name without a trailing `.pdf`
pub(crate) fn file_stem(name: &str) -> &str {
    name.strip_suffix(".pdf")
        .or_else(|| name.strip_suffix(".PDF"))
        .unwrap_or(name)
}
