//! Hand-off of a finished result to the next tool
//!
//! One tool's output becomes the next tool's input without a round trip
//! through the user's file system.

use paperknife_core::{CodecError, SourceFile};

#[derive(Debug, Default)]
pub struct PipelineSlot {
    pending: Option<SourceFile>,
    last: Option<SourceFile>,
}

impl PipelineSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a file to the next tool; `None` clears the pending file
    pub fn set(&mut self, file: Option<SourceFile>) {
        if let Some(file) = &file {
            self.last = Some(file.clone());
        }
        self.pending = file;
    }

    /// Offer materialized result bytes as a new source file
    pub fn set_result(&mut self, name: &str, bytes: &[u8]) -> Result<(), CodecError> {
        let file = SourceFile::from_bytes(name, bytes.to_vec())?;
        self.set(Some(file));
        Ok(())
    }

    /// Take the pending file, leaving the slot empty
    pub fn consume(&mut self) -> Option<SourceFile> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<&SourceFile> {
        self.pending.as_ref()
    }

    /// Most recent file ever offered, consumed or not
    pub fn last(&self) -> Option<&SourceFile> {
        self.last.as_ref()
    }
}
