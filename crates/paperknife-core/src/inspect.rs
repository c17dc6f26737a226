//! PDF metadata inspection
//!
//! Reads page count, version and lock status. This is the first stage of
//! every tool: a file that needs a password is reported as locked so the
//! user can be asked for it before any real work starts. Files encrypted
//! with only an owner password open with the empty user password and are
//! not locked.

use crate::codec::looks_encrypted;
use crate::error::CodecError;
use lopdf::Document;
use serde::Serialize;

/// PDF file information extracted during inspection
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct PdfMetadata {
    /// Number of pages in the document (0 when a locked file hides its page tree)
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// Whether the document needs a password to open
    pub is_locked: bool,
    /// Whether the document carries an encryption dictionary at all
    pub is_encrypted: bool,
    /// File size in bytes
    pub size_bytes: usize,
    /// Document title from metadata (if available)
    pub title: Option<String>,
    /// Document author from metadata (if available)
    pub author: Option<String>,
}

/// Inspect a PDF, trying the empty user password on encrypted files
pub fn inspect(bytes: &[u8]) -> Result<PdfMetadata, CodecError> {
    check_header(bytes)?;
    let version = extract_version(bytes);

    let locked = || PdfMetadata {
        page_count: 0,
        version: version.clone(),
        is_locked: true,
        is_encrypted: true,
        size_bytes: bytes.len(),
        title: None,
        author: None,
    };

    let mut document = match Document::load_mem(bytes) {
        Ok(document) => document,
        Err(_) if looks_encrypted(bytes) => return Ok(locked()),
        Err(e) => return Err(CodecError::Parse(e.to_string())),
    };

    let is_encrypted = document.is_encrypted();
    if is_encrypted && document.decrypt("").is_err() {
        return Ok(locked());
    }

    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return Err(CodecError::NoPages);
    }
    let (title, author) = extract_metadata(&document);

    Ok(PdfMetadata {
        page_count,
        version,
        is_locked: false,
        is_encrypted,
        size_bytes: bytes.len(),
        title,
        author,
    })
}

/// Inspect a locked PDF by opening it with a password.
///
/// Fails with [`CodecError::Decryption`] when the password is wrong, which
/// lets callers re-prompt before dispatching any task. On success the file
/// is reported unlocked.
pub fn inspect_with_password(bytes: &[u8], password: &str) -> Result<PdfMetadata, CodecError> {
    check_header(bytes)?;

    let mut document = Document::load_mem(bytes).map_err(|e| {
        if looks_encrypted(bytes) {
            CodecError::Decryption(e.to_string())
        } else {
            CodecError::Parse(e.to_string())
        }
    })?;

    let is_encrypted = document.is_encrypted();
    if is_encrypted {
        document
            .decrypt(password)
            .map_err(|e| CodecError::Decryption(e.to_string()))?;
    }

    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return Err(CodecError::NoPages);
    }
    let (title, author) = extract_metadata(&document);

    Ok(PdfMetadata {
        page_count,
        version: extract_version(bytes),
        is_locked: false,
        is_encrypted,
        size_bytes: bytes.len(),
        title,
        author,
    })
}

fn check_header(bytes: &[u8]) -> Result<(), CodecError> {
    if bytes.len() < 8 {
        return Err(CodecError::Parse("File too small to be a valid PDF".into()));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(CodecError::Parse(
            "Not a valid PDF file (missing %PDF- header)".into(),
        ));
    }
    Ok(())
}

/// Extract PDF version from header
fn extract_version(bytes: &[u8]) -> String {
    // Header format: %PDF-1.7
    if bytes.len() >= 8 && bytes.starts_with(b"%PDF-") {
        if let Ok(version) = std::str::from_utf8(&bytes[5..8]) {
            return version.trim().to_string();
        }
    }
    "1.4".to_string()
}

/// Extract title and author from the Info dictionary
fn extract_metadata(document: &Document) -> (Option<String>, Option<String>) {
    let Some(info) = document
        .trailer
        .get(b"Info")
        .and_then(|info| info.as_reference())
        .and_then(|id| document.get_dictionary(id))
        .ok()
    else {
        return (None, None);
    };

    let read = |key: &[u8]| {
        info.get(key)
            .and_then(|value| value.as_str())
            .ok()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .filter(|text| !text.is_empty())
    };

    (read(b"Title"), read(b"Author"))
}
