//! Tool sessions for PaperKnife
//!
//! Each tool (merge, split, compress, image to PDF, unlock, signature) is a state
//! machine that owns its own dispatch channel and result handles:
//!
//! ```text
//! Empty -> FilesStaged -> Processing -> Succeeded | Failed
//! ```
//!
//! Dropping a session releases every handle it created.

pub mod compress;
pub mod error;
pub mod image_to_pdf;
pub mod merge;
pub mod pipeline;
pub mod sign;
pub mod split;
pub mod staged;
pub mod state;
pub mod unlock;

pub use compress::{CompressSession, CompressionTier, PageRasterizer, RenderedPage};
pub use error::SessionError;
pub use image_to_pdf::{ImageSource, ImageToPdfSession};
pub use merge::MergeSession;
pub use pipeline::PipelineSlot;
pub use sign::{SignaturePlacement, SignatureSession};
pub use split::SplitSession;
pub use staged::{FileId, StagedList};
pub use state::{shared_activity_log, Phase, ProgressListener, SessionOutput, SharedActivityLog};
pub use unlock::UnlockSession;
