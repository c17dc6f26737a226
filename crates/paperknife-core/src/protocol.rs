//! Outbound worker messages and task results
//!
//! The background worker answers every task with zero or more `PROGRESS`
//! messages followed by exactly one terminal message (`SUCCESS`,
//! `SUCCESS_BATCH` or `ERROR`).

use crate::transfer::TransferBuffer;
use serde::{Deserialize, Serialize};

/// Outbound worker message: `{ "type": ..., "payload": ... }`
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    Progress(u8),
    Success(TransferBuffer),
    SuccessBatch(Vec<NamedOutput>),
    Error(String),
}

impl WorkerMessage {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerMessage::Progress(_))
    }
}

/// One file of a batch result
#[derive(Debug, Serialize, Deserialize)]
pub struct NamedOutput {
    pub name: String,
    pub buffer: TransferBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
}

/// Terminal outcome of a task
#[derive(Debug)]
pub enum TaskResult {
    Success(TransferBuffer),
    SuccessBatch(Vec<NamedOutput>),
    Failure(String),
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, TaskResult::Failure(_))
    }

    /// Convert a terminal message. Progress messages are not results.
    pub(crate) fn from_terminal(message: WorkerMessage) -> Option<Self> {
        match message {
            WorkerMessage::Progress(_) => None,
            WorkerMessage::Success(buffer) => Some(TaskResult::Success(buffer)),
            WorkerMessage::SuccessBatch(outputs) => Some(TaskResult::SuccessBatch(outputs)),
            WorkerMessage::Error(message) => Some(TaskResult::Failure(message)),
        }
    }
}
