//! Result materializer
//!
//! Turns result bytes into [`ResourceHandle`]s that the host can dereference
//! for download or preview. The materializer is the registry: every handle
//! it creates stays resolvable until released exactly once.

use crate::error::HandleError;
use crate::transfer::TransferBuffer;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_HANDLE_SCHEME: &str = "blob:paperknife";

/// A de-referenceable pointer to materialized bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceHandle {
    id: Uuid,
    url: String,
    name: String,
    size_bytes: usize,
}

impl ResourceHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Suggested download filename
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

pub struct ResultMaterializer {
    scheme: String,
    resources: HashMap<Uuid, Vec<u8>>,
}

impl Default for ResultMaterializer {
    fn default() -> Self {
        Self::new(DEFAULT_HANDLE_SCHEME)
    }
}

impl ResultMaterializer {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            resources: HashMap::new(),
        }
    }

    /// Register result bytes under a fresh handle
    pub fn materialize(&mut self, bytes: TransferBuffer, suggested_name: &str) -> ResourceHandle {
        let id = Uuid::new_v4();
        let bytes = bytes.into_inner();
        let handle = ResourceHandle {
            id,
            url: format!("{}/{}", self.scheme, id),
            name: suggested_name.to_string(),
            size_bytes: bytes.len(),
        };

        debug!("Materialized {} ({} bytes) as {}", handle.name, handle.size_bytes, handle.url);
        self.resources.insert(id, bytes);
        handle
    }

    /// Bytes behind a live handle
    pub fn resolve(&self, handle: &ResourceHandle) -> Result<&[u8], HandleError> {
        self.resources
            .get(&handle.id)
            .map(Vec::as_slice)
            .ok_or_else(|| HandleError::Released(handle.url.clone()))
    }

    pub fn is_live(&self, handle: &ResourceHandle) -> bool {
        self.resources.contains_key(&handle.id)
    }

    /// Release one handle. Releasing twice is a logged no-op; returns whether
    /// anything was freed.
    pub fn release(&mut self, handle: &ResourceHandle) -> bool {
        if self.resources.remove(&handle.id).is_some() {
            debug!("Released {}", handle.url);
            true
        } else {
            warn!("Ignoring release of {}: already released", handle.url);
            false
        }
    }

    /// Release every live handle, returning how many were freed
    pub fn release_all(&mut self) -> usize {
        let count = self.resources.len();
        self.resources.clear();
        if count > 0 {
            debug!("Released {} resource handles", count);
        }
        count
    }

    pub fn live_count(&self) -> usize {
        self.resources.len()
    }
}

impl Drop for ResultMaterializer {
    fn drop(&mut self) {
        if !self.resources.is_empty() {
            warn!(
                "Dropping materializer with {} unreleased resource handles",
                self.resources.len()
            );
        }
    }
}
