//! Compress session
//!
//! Compression re-encodes every page as a JPEG. Rendering needs a real
//! rendering surface, so it is delegated to a caller-provided
//! [`PageRasterizer`] and runs before the assembly task is dispatched.

use crate::error::SessionError;
use crate::state::{
    file_stem, pdf_name, Phase, ProgressListener, SessionCore, SessionOutput, SharedActivityLog,
};
use paperknife_core::{
    assembly_payload, inspect_with_password, RasterFormat, RasterPage, ResourceHandle, SourceFile, ToolKind,
    ToolkitConfig, ValidationError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const EDITABLE: &[Phase] = &[Phase::Empty, Phase::FilesStaged, Phase::Succeeded, Phase::Failed];
const STAGED: &[Phase] = &[Phase::FilesStaged, Phase::Failed];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionTier {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionTier {
    /// Render scale relative to the page's natural size
    pub fn scale(self) -> f32 {
        match self {
            CompressionTier::Low => 1.0,
            CompressionTier::Medium => 1.5,
            CompressionTier::High => 2.0,
        }
    }

    /// JPEG quality in `0.0..=1.0`
    pub fn jpeg_quality(self) -> f32 {
        match self {
            CompressionTier::Low => 0.3,
            CompressionTier::Medium => 0.5,
            CompressionTier::High => 0.7,
        }
    }
}

/// A page rendered to JPEG
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Renders pages of a PDF to JPEG images
pub trait PageRasterizer {
    /// Render page `page` (1-indexed) of `file`
    fn render_page(
        &mut self,
        file: &SourceFile,
        page: u32,
        scale: f32,
        jpeg_quality: f32,
    ) -> Result<RenderedPage, String>;
}

pub struct CompressSession<R: PageRasterizer> {
    core: SessionCore,
    rasterizer: R,
    file: Option<SourceFile>,
    tier: CompressionTier,
}

impl<R: PageRasterizer> CompressSession<R> {
    pub fn new(config: ToolkitConfig, rasterizer: R) -> Result<Self, SessionError> {
        Ok(Self {
            core: SessionCore::new(config)?,
            rasterizer,
            file: None,
            tier: CompressionTier::default(),
        })
    }

    pub fn with_activity_log(mut self, log: SharedActivityLog) -> Self {
        self.core.set_activity_log(log);
        self
    }

    pub fn set_progress_listener(&mut self, listener: ProgressListener) {
        self.core.set_progress_listener(listener);
    }

    /// Stage the file to compress.
    ///
    /// A locked file must carry its password; the password is checked here so
    /// a wrong one is reported before any page is rendered.
    pub fn load_file(&mut self, file: SourceFile) -> Result<(), SessionError> {
        self.core.ensure("load a file", EDITABLE)?;

        let file = if file.is_locked() {
            let metadata = match file.password() {
                Some(password) => inspect_with_password(file.bytes(), password)?,
                None => {
                    return Err(ValidationError::LockedFileUnresolved {
                        name: file.name().to_string(),
                    }
                    .into())
                }
            };
            file.with_metadata(metadata)
        } else {
            file
        };

        debug!("Loaded {} for compression ({} pages)", file.name(), file.page_count());
        self.file = Some(file);
        self.core.staged(1);
        Ok(())
    }

    pub fn set_tier(&mut self, tier: CompressionTier) -> Result<(), SessionError> {
        self.core.ensure("change compression tier", STAGED)?;
        self.tier = tier;
        self.core.staged(1);
        Ok(())
    }

    /// Render every page, then assemble the renders into a new document
    pub async fn execute(&mut self) -> Result<&SessionOutput, SessionError> {
        self.core.ensure("compress", STAGED)?;
        let file = self.file.clone().ok_or(ValidationError::EmptyInput)?;

        let pages = match self.render_all(&file) {
            Ok(pages) => pages,
            Err(e) => {
                self.core.fail(e.to_string());
                return Err(e);
            }
        };

        let payload = match assembly_payload(pages) {
            Ok(payload) => payload,
            Err(e) => {
                self.core.fail(e.to_string());
                return Err(e.into());
            }
        };
        let name = pdf_name(&format!(
            "{}{}",
            file_stem(file.name()),
            self.core.config().compressed_suffix
        ));

        self.core.dispatch(payload, ToolKind::Compress, &name).await
    }

    fn render_all(&mut self, file: &SourceFile) -> Result<Vec<RasterPage>, SessionError> {
        let (scale, quality) = (self.tier.scale(), self.tier.jpeg_quality());

        (1..=file.page_count())
            .map(|page| {
                let rendered = self
                    .rasterizer
                    .render_page(file, page, scale, quality)
                    .map_err(|message| SessionError::Rasterize { page, message })?;
                debug!(
                    "Rendered page {} at {}x{} ({} bytes)",
                    page,
                    rendered.width,
                    rendered.height,
                    rendered.jpeg.len()
                );
                Ok(RasterPage::new(
                    rendered.jpeg,
                    RasterFormat::Jpeg,
                    rendered.width,
                    rendered.height,
                ))
            })
            .collect()
    }

    /// Size reduction of the result in percent; negative when it grew
    pub fn reduction_percent(&self) -> Option<f64> {
        let original = self.file.as_ref()?.original_size();
        let compressed = self.core.output()?.total_size();
        if original == 0 {
            return None;
        }
        Some(100.0 * (1.0 - compressed as f64 / original as f64))
    }

    pub fn reset(&mut self) {
        self.file = None;
        self.core.reset();
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }

    pub fn tier(&self) -> CompressionTier {
        self.tier
    }

    pub fn file(&self) -> Option<&SourceFile> {
        self.file.as_ref()
    }

    pub fn output(&self) -> Option<&SessionOutput> {
        self.core.output()
    }

    pub fn error(&self) -> Option<&str> {
        self.core.error()
    }

    pub fn resolve(&self, handle: &ResourceHandle) -> Result<&[u8], SessionError> {
        self.core.resolve(handle)
    }
}
