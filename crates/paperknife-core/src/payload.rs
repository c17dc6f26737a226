//! Task payloads and the payload builder
//!
//! A [`TaskPayload`] is the single inbound message shipped to the background
//! worker. Payloads are built from staged [`SourceFile`]s by the `*_payload`
//! functions below, which validate everything that can be checked without
//! decoding a document. Building copies the file bytes into move-only
//! [`TransferBuffer`]s, so the staged files stay intact for a retry.

use crate::codec::{PageSize, RasterFormat};
use crate::error::{CodecError, ValidationError};
use crate::inspect::{inspect, PdfMetadata};
use crate::transfer::TransferBuffer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A user-selected PDF. Immutable; `with_*` methods return a new value.
#[derive(Clone)]
pub struct SourceFile {
    name: String,
    bytes: Arc<[u8]>,
    password: Option<String>,
    rotation: i32,
    metadata: PdfMetadata,
}

impl SourceFile {
    /// Wrap raw bytes, inspecting them for page count and lock status
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, CodecError> {
        let metadata = inspect(&bytes)?;
        Ok(Self {
            name: name.into(),
            bytes: bytes.into(),
            password: None,
            rotation: 0,
            metadata,
        })
    }

    pub fn with_password(self, password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..self
        }
    }

    /// Replace the metadata, e.g. after a successful unlock revealed the page count
    pub fn with_metadata(self, metadata: PdfMetadata) -> Self {
        Self { metadata, ..self }
    }

    /// Rotation delta applied to every page of this file when merging
    pub fn with_rotation(self, degrees: i32) -> Self {
        Self {
            rotation: degrees,
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    pub fn original_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn metadata(&self) -> &PdfMetadata {
        &self.metadata
    }

    pub fn page_count(&self) -> u32 {
        self.metadata.page_count
    }

    pub fn is_locked(&self) -> bool {
        self.metadata.is_locked
    }

    /// Locked and no password supplied yet
    pub fn needs_password(&self) -> bool {
        self.metadata.is_locked && self.password.is_none()
    }

    fn transfer(&self) -> TransferBuffer {
        TransferBuffer::copy_from(&self.bytes)
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .field("locked", &self.metadata.is_locked)
            .field("has_password", &self.password.is_some())
            .field("rotation", &self.rotation)
            .finish()
    }
}

/// Inbound worker message: `{ "type": ..., "payload": ... }`
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPayload {
    MergePdfs(MergePayload),
    SplitPdf(SplitPayload),
    CompressPdfAssembly(AssemblyPayload),
}

impl TaskPayload {
    /// Wire tag of this payload
    pub fn kind(&self) -> &'static str {
        match self {
            TaskPayload::MergePdfs(_) => "MERGE_PDFS",
            TaskPayload::SplitPdf(_) => "SPLIT_PDF",
            TaskPayload::CompressPdfAssembly(_) => "COMPRESS_PDF_ASSEMBLY",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MergePayload {
    pub files: Vec<MergeEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MergeEntry {
    pub buffer: TransferBuffer,
    /// Normalized to `[0, 360)`
    pub rotation: u16,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitMode {
    /// One output containing every selected page
    Single,
    /// One single-page output per selected page
    Batch,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPayload {
    pub buffer: TransferBuffer,
    #[serde(default)]
    pub password: Option<String>,
    /// 1-indexed page numbers as selected by the user
    pub selected_pages: Vec<u32>,
    pub mode: SplitMode,
    pub output_name_prefix: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssemblyPayload {
    pub pages: Vec<RasterPage>,
}

/// A pre-rendered page image
#[derive(Debug, Serialize, Deserialize)]
pub struct RasterPage {
    pub buffer: TransferBuffer,
    pub format: RasterFormat,
    pub width: u32,
    pub height: u32,
}

impl RasterPage {
    pub fn new(bytes: Vec<u8>, format: RasterFormat, width: u32, height: u32) -> Self {
        Self {
            buffer: TransferBuffer::new(bytes),
            format,
            width,
            height,
        }
    }

    pub fn size(&self) -> PageSize {
        PageSize::new(self.width, self.height)
    }
}

/// Normalize a rotation delta into `[0, 360)`
pub fn normalize_rotation(degrees: i32) -> u16 {
    degrees.rem_euclid(360) as u16
}

/// Package staged files for a merge
pub fn merge_payload(files: &[SourceFile]) -> Result<TaskPayload, ValidationError> {
    if files.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    ensure_unlocked(files)?;

    let files = files
        .iter()
        .map(|file| MergeEntry {
            buffer: file.transfer(),
            rotation: normalize_rotation(file.rotation()),
            password: file.password.clone(),
        })
        .collect();

    Ok(TaskPayload::MergePdfs(MergePayload { files }))
}

/// Package a split of `file`.
///
/// The selection is passed through as given (order and repeats included);
/// the worker sorts it.
pub fn split_payload(
    file: &SourceFile,
    selected_pages: &[u32],
    mode: SplitMode,
    output_name_prefix: &str,
) -> Result<TaskPayload, ValidationError> {
    ensure_unlocked(std::slice::from_ref(file))?;
    validate_selection(selected_pages, file.page_count())?;

    Ok(TaskPayload::SplitPdf(SplitPayload {
        buffer: file.transfer(),
        password: file.password.clone(),
        selected_pages: selected_pages.to_vec(),
        mode,
        output_name_prefix: output_name_prefix.to_string(),
    }))
}

/// Package pre-rendered page images for assembly into a fresh document
pub fn assembly_payload(pages: Vec<RasterPage>) -> Result<TaskPayload, ValidationError> {
    if pages.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    if let Some(position) = pages.iter().position(|p| p.width == 0 || p.height == 0) {
        return Err(ValidationError::InvalidPageSelection(format!(
            "Page image {} has zero width or height",
            position + 1
        )));
    }

    Ok(TaskPayload::CompressPdfAssembly(AssemblyPayload { pages }))
}

/// Check a 1-indexed selection against a page count
pub fn validate_selection(pages: &[u32], page_count: u32) -> Result<(), ValidationError> {
    if pages.is_empty() {
        return Err(ValidationError::InvalidPageSelection(
            "No pages selected".into(),
        ));
    }
    if let Some(page) = pages.iter().find(|&&p| p == 0 || p > page_count) {
        return Err(ValidationError::InvalidPageSelection(format!(
            "Page {} is out of range (1-{})",
            page, page_count
        )));
    }
    Ok(())
}

fn ensure_unlocked(files: &[SourceFile]) -> Result<(), ValidationError> {
    match files.iter().find(|file| file.needs_password()) {
        Some(file) => Err(ValidationError::LockedFileUnresolved {
            name: file.name.clone(),
        }),
        None => Ok(()),
    }
}
