//! Image to PDF session
//!
//! Stages JPEG and PNG images and assembles them into one PDF, one page per
//! image at the image's pixel size. Runs as a `COMPRESS_PDF_ASSEMBLY` task;
//! JPEG colour spaces (grey, RGB, CMYK) are taken from the frame header
//! when the image is embedded.

use crate::error::SessionError;
use crate::staged::{FileId, StagedList};
use crate::state::{pdf_name, Phase, ProgressListener, SessionCore, SessionOutput, SharedActivityLog};
use image::ImageFormat;
use paperknife_core::{
    assembly_payload, RasterFormat, RasterPage, ResourceHandle, ToolKind, ToolkitConfig,
};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_STEM: &str = "paperknife-images-to-pdf";

const EDITABLE: &[Phase] = &[Phase::Empty, Phase::FilesStaged, Phase::Succeeded, Phase::Failed];
const STAGED: &[Phase] = &[Phase::FilesStaged, Phase::Failed];

/// A staged image with its detected format and size
#[derive(Debug, Clone)]
pub struct ImageSource {
    name: String,
    bytes: Arc<[u8]>,
    format: RasterFormat,
    width: u32,
    height: u32,
}

impl ImageSource {
    /// Read format and dimensions without decoding pixel data
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, SessionError> {
        let name = name.into();
        let reader = image::io::Reader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| SessionError::UnsupportedImage(format!("{}: {}", name, e)))?;

        let format = match reader.format() {
            Some(ImageFormat::Jpeg) => RasterFormat::Jpeg,
            Some(ImageFormat::Png) => RasterFormat::Png,
            Some(other) => {
                return Err(SessionError::UnsupportedImage(format!(
                    "{}: {:?} images are not supported",
                    name, other
                )))
            }
            None => {
                return Err(SessionError::UnsupportedImage(format!(
                    "{}: unrecognised image data",
                    name
                )))
            }
        };

        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| SessionError::UnsupportedImage(format!("{}: {}", name, e)))?;

        Ok(Self {
            name,
            bytes: bytes.into(),
            format,
            width,
            height,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn raster_page(&self) -> RasterPage {
        RasterPage::new(self.bytes.to_vec(), self.format, self.width, self.height)
    }
}

pub struct ImageToPdfSession {
    core: SessionCore,
    images: StagedList<ImageSource>,
    output_stem: String,
}

impl ImageToPdfSession {
    pub fn new(config: ToolkitConfig) -> Result<Self, SessionError> {
        Ok(Self {
            core: SessionCore::new(config)?,
            images: StagedList::new(),
            output_stem: DEFAULT_STEM.to_string(),
        })
    }

    pub fn with_activity_log(mut self, log: SharedActivityLog) -> Self {
        self.core.set_activity_log(log);
        self
    }

    pub fn set_progress_listener(&mut self, listener: ProgressListener) {
        self.core.set_progress_listener(listener);
    }

    pub fn add_images(
        &mut self,
        images: impl IntoIterator<Item = ImageSource>,
    ) -> Result<Vec<FileId>, SessionError> {
        self.core.ensure("add images", EDITABLE)?;

        let ids: Vec<FileId> = images
            .into_iter()
            .map(|image| self.images.push(image))
            .collect();
        debug!("Staged {} image(s), {} total", ids.len(), self.images.len());
        self.core.staged(self.images.len());
        Ok(ids)
    }

    pub fn remove_image(&mut self, id: FileId) -> Result<ImageSource, SessionError> {
        self.core.ensure("remove an image", STAGED)?;
        let image = self.images.remove(id)?;
        self.core.staged(self.images.len());
        Ok(image)
    }

    pub fn reorder(&mut self, id: FileId, new_index: usize) -> Result<(), SessionError> {
        self.core.ensure("reorder images", STAGED)?;
        self.images.reorder(id, new_index)?;
        self.core.staged(self.images.len());
        Ok(())
    }

    pub fn set_output_name(&mut self, stem: impl Into<String>) {
        self.output_stem = stem.into();
    }

    pub async fn execute(&mut self) -> Result<&SessionOutput, SessionError> {
        self.core.ensure("convert images", STAGED)?;

        let pages = self.images.iter().map(ImageSource::raster_page).collect();
        let payload = assembly_payload(pages)?;
        let name = pdf_name(&self.output_stem);

        self.core.dispatch(payload, ToolKind::ImageToPdf, &name).await
    }

    pub fn reset(&mut self) {
        self.images.clear();
        self.core.reset();
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageSource> {
        self.images.iter()
    }

    pub fn image_ids(&self) -> Vec<FileId> {
        self.images.ids()
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
