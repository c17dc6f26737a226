//! Signature session
//!
//! Stamps a PNG or JPEG signature onto one page of a PDF. Position is given
//! as a percentage of the page measured from the top-left corner, and the
//! width in PDF points; the height follows the image's aspect ratio.
//!
//! Like unlock, the work runs on tokio's blocking pool rather than a
//! dispatch channel.

use crate::error::SessionError;
use crate::image_to_pdf::ImageSource;
use crate::state::{pdf_name, Phase, SessionCore, SessionOutput, SharedActivityLog};
use paperknife_core::{
    inspect_with_password, Codec, CodecError, ImagePlacement, PageSize, PdfMetadata,
    ResourceHandle, SourceFile, ToolKind, ToolkitConfig, ValidationError,
};
use tracing::debug;

const DEFAULT_STEM: &str = "paperknife-signed";

const EDITABLE: &[Phase] = &[Phase::Empty, Phase::FilesStaged, Phase::Succeeded, Phase::Failed];
const STAGED: &[Phase] = &[Phase::FilesStaged, Phase::Failed];

/// Where the signature goes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignaturePlacement {
    /// 1-indexed page
    pub page: u32,
    /// Left edge, percent of page width from the left
    pub x_percent: f64,
    /// Top edge, percent of page height from the top
    pub y_percent: f64,
    /// Drawn width in points
    pub width: f64,
}

impl Default for SignaturePlacement {
    fn default() -> Self {
        Self {
            page: 1,
            x_percent: 50.0,
            y_percent: 50.0,
            width: 150.0,
        }
    }
}

impl SignaturePlacement {
    /// Resolve against a page MediaBox and the image's pixel size.
    ///
    /// PDF space grows upwards, so the top edge is flipped and then lowered
    /// by the drawn height.
    pub fn resolve(&self, media_box: [f64; 4], image: PageSize) -> ImagePlacement {
        let [x0, y0, x1, y1] = media_box;
        let page_width = x1 - x0;
        let page_height = y1 - y0;
        let height = self.width * f64::from(image.height) / f64::from(image.width);

        let x = x0 + self.x_percent / 100.0 * page_width;
        let y = y0 + page_height - self.y_percent / 100.0 * page_height - height;
        ImagePlacement::new(x, y, self.width, height)
    }

    fn validate(&self, page_count: u32) -> Result<(), ValidationError> {
        if self.page == 0 || self.page > page_count {
            return Err(ValidationError::InvalidPageSelection(format!(
                "Page {} is out of range (1-{})",
                self.page, page_count
            )));
        }
        for (axis, value) in [("x", self.x_percent), ("y", self.y_percent)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ValidationError::InvalidPlacement(format!(
                    "{} position {} is outside 0-100%",
                    axis, value
                )));
            }
        }
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(ValidationError::InvalidPlacement(format!(
                "Width must be positive, got {}",
                self.width
            )));
        }
        Ok(())
    }
}

pub struct SignatureSession {
    core: SessionCore,
    file: Option<SourceFile>,
    signature: Option<ImageSource>,
    placement: SignaturePlacement,
    output_stem: String,
}

impl SignatureSession {
    pub fn new(config: ToolkitConfig) -> Self {
        Self {
            core: SessionCore::without_channel(config),
            file: None,
            signature: None,
            placement: SignaturePlacement::default(),
            output_stem: DEFAULT_STEM.to_string(),
        }
    }

    pub fn with_activity_log(mut self, log: SharedActivityLog) -> Self {
        self.core.set_activity_log(log);
        self
    }

    /// Stage the document to sign. The placement goes back to page 1.
    ///
    /// A locked file is accepted without its password; [`SignatureSession::unlock`]
    /// must succeed before the signature can be placed.
    pub fn load_file(&mut self, file: SourceFile) -> Result<&PdfMetadata, SessionError> {
        self.core.ensure("load a file", EDITABLE)?;
        debug!(
            "Loaded {} for signing ({} pages, locked: {})",
            file.name(),
            file.page_count(),
            file.is_locked()
        );
        self.placement = SignaturePlacement::default();
        self.core.staged(1);
        Ok(self.file.insert(file).metadata())
    }

    /// Verify a password against the staged file and keep it for signing
    pub fn unlock(&mut self, password: &str) -> Result<&PdfMetadata, SessionError> {
        self.core.ensure("unlock", STAGED)?;
        let file = self.file.take().ok_or(ValidationError::EmptyInput)?;

        let metadata = match inspect_with_password(file.bytes(), password) {
            Ok(metadata) => metadata,
            Err(e) => {
                self.file = Some(file);
                return Err(e.into());
            }
        };

        self.core.staged(1);
        Ok(self
            .file
            .insert(file.with_password(password).with_metadata(metadata))
            .metadata())
    }

    pub fn set_signature(&mut self, image: ImageSource) -> Result<(), SessionError> {
        self.core.ensure("set a signature", EDITABLE)?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(SessionError::UnsupportedImage(format!(
                "{}: image has no area",
                image.name()
            )));
        }
        debug!("Signature image {} ({}x{})", image.name(), width, height);
        self.signature = Some(image);
        if self.file.is_some() {
            self.core.staged(1);
        }
        Ok(())
    }

    /// Move the signature. `x_percent`/`y_percent` are in `0..=100` from the
    /// page's top-left corner; `width` is in points.
    pub fn place(
        &mut self,
        page: u32,
        x_percent: f64,
        y_percent: f64,
        width: f64,
    ) -> Result<(), SessionError> {
        self.core.ensure("place a signature", STAGED)?;
        let file = self.unlocked_file()?;

        let placement = SignaturePlacement {
            page,
            x_percent,
            y_percent,
            width,
        };
        placement.validate(file.page_count())?;

        self.placement = placement;
        self.core.staged(1);
        Ok(())
    }

    pub fn set_output_name(&mut self, stem: impl Into<String>) {
        self.output_stem = stem.into();
    }

    pub async fn execute(&mut self) -> Result<&SessionOutput, SessionError> {
        self.core.ensure("sign", STAGED)?;
        let file = self.unlocked_file()?.clone();
        let signature = self
            .signature
            .clone()
            .ok_or_else(|| SessionError::UnsupportedImage("No signature image set".into()))?;
        let placement = self.placement;
        placement.validate(file.page_count())?;

        self.core.begin();
        let outcome =
            tokio::task::spawn_blocking(move || stamp(&file, &signature, placement)).await;

        let signed = match outcome {
            Ok(Ok(signed)) => signed,
            Ok(Err(e)) => return Err(self.core.fail(e.to_string())),
            Err(e) => {
                self.core.fail(e.to_string());
                return Err(e.into());
            }
        };

        let name = pdf_name(&self.output_stem);
        self.core.complete_with_bytes(signed, ToolKind::Signature, &name)
    }

    pub fn reset(&mut self) {
        self.file = None;
        self.signature = None;
        self.placement = SignaturePlacement::default();
        self.core.reset();
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }

    pub fn file(&self) -> Option<&SourceFile> {
        self.file.as_ref()
    }

    pub fn signature(&self) -> Option<&ImageSource> {
        self.signature.as_ref()
    }

    pub fn placement(&self) -> SignaturePlacement {
        self.placement
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

    fn unlocked_file(&self) -> Result<&SourceFile, SessionError> {
        let file = self.file.as_ref().ok_or(ValidationError::EmptyInput)?;
        if file.needs_password() {
            return Err(ValidationError::LockedFileUnresolved {
                name: file.name().to_string(),
            }
            .into());
        }
        Ok(file)
    }
}

fn stamp(
    file: &SourceFile,
    signature: &ImageSource,
    placement: SignaturePlacement,
) -> Result<Vec<u8>, CodecError> {
    let mut codec = Codec::new();
    let document = codec.load_document(file.bytes(), file.password())?;

    let pages = codec.pages(document)?;
    let index = placement.page as usize - 1;
    let page = *pages.get(index).ok_or(CodecError::PageOutOfRange {
        index,
        count: pages.len(),
    })?;

    let image = codec.embed_raster_image(document, signature.bytes(), signature.format())?;
    let image_size = codec.image_size(image)?;
    let media_box = codec.page_media_box(page)?;

    codec.overlay_image(page, image, placement.resolve(media_box, image_size))?;
    codec.serialize(document)
}
