use crate::staged::FileId;
use crate::state::Phase;
use paperknife_core::{CodecError, DispatchError, HandleError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error("Cannot {action} while {phase:?}")]
    InvalidTransition { action: &'static str, phase: Phase },

    #[error("No staged file with id {0}")]
    UnknownFile(FileId),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Failed to render page {page}: {message}")]
    Rasterize { page: u32, message: String },

    /// The background task ended with an `ERROR` message
    #[error("{0}")]
    TaskFailed(String),

    #[error("Background task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}
