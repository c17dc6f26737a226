//! Merge session
//!
//! `Empty -> FilesStaged -> Processing -> Succeeded | Failed`. Staged files
//! survive a failure so the user can retry without re-selecting them.

use crate::error::SessionError;
use crate::staged::{FileId, StagedList};
use crate::state::{pdf_name, Phase, ProgressListener, SessionCore, SessionOutput, SharedActivityLog};
use paperknife_core::{merge_payload, ResourceHandle, SourceFile, ToolKind, ToolkitConfig};
use tracing::debug;

const EDITABLE: &[Phase] = &[Phase::Empty, Phase::FilesStaged, Phase::Succeeded, Phase::Failed];
const STAGED: &[Phase] = &[Phase::FilesStaged, Phase::Failed];

pub struct MergeSession {
    core: SessionCore,
    files: StagedList<SourceFile>,
    output_stem: String,
}

impl MergeSession {
    pub fn new(config: ToolkitConfig) -> Result<Self, SessionError> {
        let output_stem = config.merged_file_stem.clone();
        Ok(Self {
            core: SessionCore::new(config)?,
            files: StagedList::new(),
            output_stem,
        })
    }

    pub fn with_activity_log(mut self, log: SharedActivityLog) -> Self {
        self.core.set_activity_log(log);
        self
    }

    pub fn set_progress_listener(&mut self, listener: ProgressListener) {
        self.core.set_progress_listener(listener);
    }

    /// Append files. Re-entering from `Succeeded` revokes the previous result.
    pub fn add_files(
        &mut self,
        files: impl IntoIterator<Item = SourceFile>,
    ) -> Result<Vec<FileId>, SessionError> {
        self.core.ensure("add files", EDITABLE)?;

        let ids: Vec<FileId> = files.into_iter().map(|file| self.files.push(file)).collect();
        debug!("Staged {} file(s) for merge, {} total", ids.len(), self.files.len());
        self.core.staged(self.files.len());
        Ok(ids)
    }

    pub fn remove_file(&mut self, id: FileId) -> Result<SourceFile, SessionError> {
        self.core.ensure("remove a file", STAGED)?;
        let file = self.files.remove(id)?;
        self.core.staged(self.files.len());
        Ok(file)
    }

    pub fn reorder(&mut self, id: FileId, new_index: usize) -> Result<(), SessionError> {
        self.core.ensure("reorder files", STAGED)?;
        self.files.reorder(id, new_index)?;
        self.core.staged(self.files.len());
        Ok(())
    }

    /// Rotation delta applied to every page of one file
    pub fn set_rotation(&mut self, id: FileId, degrees: i32) -> Result<(), SessionError> {
        self.core.ensure("rotate a file", STAGED)?;
        self.files.replace(id, |file| file.with_rotation(degrees))?;
        self.core.staged(self.files.len());
        Ok(())
    }

    /// Attach the password for a locked file
    pub fn set_password(&mut self, id: FileId, password: &str) -> Result<(), SessionError> {
        self.core.ensure("set a password", STAGED)?;
        self.files.replace(id, |file| file.with_password(password))?;
        self.core.staged(self.files.len());
        Ok(())
    }

    pub fn set_output_name(&mut self, stem: impl Into<String>) {
        self.output_stem = stem.into();
    }

    /// Files that still need a password before `execute` can run
    pub fn locked_files(&self) -> Vec<FileId> {
        self.files
            .ids()
            .into_iter()
            .filter(|id| self.files.get(*id).is_some_and(SourceFile::needs_password))
            .collect()
    }

    pub async fn execute(&mut self) -> Result<&SessionOutput, SessionError> {
        self.core.ensure("merge", STAGED)?;

        let files: Vec<SourceFile> = self.files.iter().cloned().collect();
        let payload = merge_payload(&files)?;
        let name = pdf_name(&self.output_stem);

        self.core.dispatch(payload, ToolKind::Merge, &name).await
    }

    /// Start over: drop staged files and release every result
    pub fn reset(&mut self) {
        self.files.clear();
        self.core.reset();
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }

    pub fn file_ids(&self) -> Vec<FileId> {
        self.files.ids()
    }

    pub fn total_pages(&self) -> u32 {
        self.files.iter().map(SourceFile::page_count).sum()
    }

    pub fn output(&self) -> Option<&SessionOutput> {
        self.core.output()
    }

    pub fn error(&self) -> Option<&str> {
        self.core.error()
    }

    pub fn progress(&self) -> u8 {
        self.core.progress()
    }

    pub fn resolve(&self, handle: &ResourceHandle) -> Result<&[u8], SessionError> {
        self.core.resolve(handle)
    }

    pub fn live_handles(&self) -> usize {
        self.core.live_handles()
    }
}
