//! Split session
//!
//! One source file. A locked file can be loaded and inspected before its
//! password is known; page selection and execution wait for [`SplitSession::unlock`].

use crate::error::SessionError;
use crate::state::{pdf_name, Phase, ProgressListener, SessionCore, SessionOutput, SharedActivityLog};
use paperknife_core::payload::validate_selection;
use paperknife_core::{
    inspect_with_password, parse_ranges, split_payload, PdfMetadata, ResourceHandle, SourceFile,
    SplitMode, ToolKind, ToolkitConfig, ValidationError,
};
use tracing::debug;

const EDITABLE: &[Phase] = &[Phase::Empty, Phase::FilesStaged, Phase::Succeeded, Phase::Failed];
const STAGED: &[Phase] = &[Phase::FilesStaged, Phase::Failed];

pub struct SplitSession {
    core: SessionCore,
    file: Option<SourceFile>,
    selected_pages: Vec<u32>,
    mode: SplitMode,
    prefix: String,
}

impl SplitSession {
    pub fn new(config: ToolkitConfig) -> Result<Self, SessionError> {
        let prefix = config.split_prefix.clone();
        Ok(Self {
            core: SessionCore::new(config)?,
            file: None,
            selected_pages: Vec::new(),
            mode: SplitMode::Single,
            prefix,
        })
    }

    pub fn with_activity_log(mut self, log: SharedActivityLog) -> Self {
        self.core.set_activity_log(log);
        self
    }

    pub fn set_progress_listener(&mut self, listener: ProgressListener) {
        self.core.set_progress_listener(listener);
    }

    /// Stage the source file, replacing any previous one.
    ///
    /// Every page is selected by default. Returns the inspected metadata; a
    /// locked file reports `is_locked` and no pages until unlocked.
    pub fn load_file(&mut self, file: SourceFile) -> Result<&PdfMetadata, SessionError> {
        self.core.ensure("load a file", EDITABLE)?;

        self.selected_pages = all_pages(&file);
        debug!(
            "Loaded {} for split ({} pages, locked: {})",
            file.name(),
            file.page_count(),
            file.is_locked()
        );
        self.core.staged(1);
        Ok(self.file.insert(file).metadata())
    }

    /// Verify a password against the staged file and keep it for the task
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

        let file = file.with_password(password).with_metadata(metadata);
        self.selected_pages = all_pages(&file);
        self.core.staged(1);
        Ok(self.file.insert(file).metadata())
    }

    pub fn select_pages(&mut self, pages: Vec<u32>) -> Result<(), SessionError> {
        self.core.ensure("select pages", STAGED)?;
        let file = self.unlocked_file()?;
        validate_selection(&pages, file.page_count())?;

        self.selected_pages = pages;
        self.core.staged(1);
        Ok(())
    }

    /// Select pages from a range string such as `"1-3, 5"`
    pub fn select_ranges(&mut self, ranges: &str) -> Result<(), SessionError> {
        self.core.ensure("select pages", STAGED)?;
        let page_count = self.unlocked_file()?.page_count();
        let pages = parse_ranges(ranges, page_count)?;
        self.select_pages(pages)
    }

    pub fn set_mode(&mut self, mode: SplitMode) -> Result<(), SessionError> {
        self.core.ensure("change split mode", STAGED)?;
        self.mode = mode;
        self.core.staged(1);
        Ok(())
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub async fn execute(&mut self) -> Result<&SessionOutput, SessionError> {
        self.core.ensure("split", STAGED)?;
        let file = self.file.as_ref().ok_or(ValidationError::EmptyInput)?;

        let payload = split_payload(file, &self.selected_pages, self.mode, &self.prefix)?;
        let name = pdf_name(&self.prefix);

        self.core.dispatch(payload, ToolKind::Split, &name).await
    }

    pub fn reset(&mut self) {
        self.file = None;
        self.selected_pages.clear();
        self.core.reset();
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }

    pub fn file(&self) -> Option<&SourceFile> {
        self.file.as_ref()
    }

    pub fn selected_pages(&self) -> &[u32] {
        &self.selected_pages
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
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

    pub fn live_handles(&self) -> usize {
        self.core.live_handles()
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

fn all_pages(file: &SourceFile) -> Vec<u32> {
    (1..=file.page_count()).collect()
}
