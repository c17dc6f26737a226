//! Move-only byte buffers for the dispatch boundary
//!
//! Every byte sequence that crosses between the initiating side and the
//! background worker travels as a [`TransferBuffer`]. The type deliberately
//! has no `Clone` impl: handing a buffer to a payload moves it, and the
//! sender cannot touch it afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TransferBuffer(Vec<u8>);

impl TransferBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Copy borrowed bytes into a fresh buffer that can be transferred.
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take exclusive ownership of the underlying bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for TransferBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for TransferBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Buffers can be tens of megabytes; never dump them into logs.
impl fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransferBuffer({} bytes)", self.0.len())
    }
}
