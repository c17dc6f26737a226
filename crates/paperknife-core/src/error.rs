use thiserror::Error;

/// Bad caller input, rejected before anything is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No input files provided")]
    EmptyInput,

    #[error("\"{name}\" is password protected and no password was supplied")]
    LockedFileUnresolved { name: String },

    #[error("Invalid page selection: {0}")]
    InvalidPageSelection(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),
}

/// Failures raised by the document codec adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Failed to decrypt PDF: {0}")]
    Decryption(String),

    #[error("PDF has no pages")]
    NoPages,

    #[error("Page index {index} does not exist (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Document handle {0} is no longer valid")]
    StaleHandle(usize),

    #[error("Page or image belongs to a different document")]
    ForeignHandle,

    #[error("Failed to embed image: {0}")]
    Image(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),

    #[error("Failed to save PDF: {0}")]
    Save(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("A task is already in flight on this channel")]
    ConcurrentSubmission,

    #[error("Background worker is not running")]
    WorkerUnavailable,

    #[error("Failed to start background worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("Resource handle {0} has already been released")]
    Released(String),
}
