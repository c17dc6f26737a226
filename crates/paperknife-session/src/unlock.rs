//! Unlock session
//!
//! Opens a password-protected PDF and re-saves it without encryption. The
//! work runs on tokio's blocking pool rather than a dispatch channel, since
//! it has no wire payload and reports no per-page progress.

use crate::error::SessionError;
use crate::state::{file_stem, pdf_name, Phase, SessionCore, SessionOutput, SharedActivityLog};
use paperknife_core::{
    Codec, CodecError, ResourceHandle, SourceFile, ToolKind, ToolkitConfig, ValidationError,
};
use tracing::debug;

const UNLOCKED_SUFFIX: &str = "-unlocked";

const EDITABLE: &[Phase] = &[Phase::Empty, Phase::FilesStaged, Phase::Succeeded, Phase::Failed];
const STAGED: &[Phase] = &[Phase::FilesStaged, Phase::Failed];

pub struct UnlockSession {
    core: SessionCore,
    file: Option<SourceFile>,
}

impl UnlockSession {
    pub fn new(config: ToolkitConfig) -> Self {
        Self {
            core: SessionCore::without_channel(config),
            file: None,
        }
    }

    pub fn with_activity_log(mut self, log: SharedActivityLog) -> Self {
        self.core.set_activity_log(log);
        self
    }

    pub fn load_file(&mut self, file: SourceFile) -> Result<(), SessionError> {
        self.core.ensure("load a file", EDITABLE)?;
        debug!("Loaded {} for unlock (locked: {})", file.name(), file.is_locked());
        self.file = Some(file);
        self.core.staged(1);
        Ok(())
    }

    /// Whether the staged file has no encryption to remove
    pub fn is_already_unlocked(&self) -> bool {
        self.file
            .as_ref()
            .is_some_and(|file| !file.metadata().is_encrypted)
    }

    /// Decrypt with `password` and materialize an unencrypted copy.
    ///
    /// A wrong password moves the session to `Failed`; call again with
    /// another password to retry.
    pub async fn unlock(&mut self, password: &str) -> Result<&SessionOutput, SessionError> {
        self.core.ensure("unlock", STAGED)?;
        let Some(file) = self.file.clone() else {
            return Err(ValidationError::EmptyInput.into());
        };

        self.core.begin();
        let password = password.to_string();
        let source = file.clone();
        let outcome =
            tokio::task::spawn_blocking(move || decrypt_and_save(&source, &password)).await;

        let unlocked = match outcome {
            Ok(Ok(unlocked)) => unlocked,
            Ok(Err(e)) => return Err(self.core.fail(e.to_string())),
            Err(e) => {
                self.core.fail(e.to_string());
                return Err(e.into());
            }
        };

        let name = pdf_name(&format!("{}{}", file_stem(file.name()), UNLOCKED_SUFFIX));
        self.core.complete_with_bytes(unlocked, ToolKind::Unlock, &name)
    }

    pub fn reset(&mut self) {
        self.file = None;
        self.core.reset();
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
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

fn decrypt_and_save(file: &SourceFile, password: &str) -> Result<Vec<u8>, CodecError> {
    let mut codec = Codec::new();
    let document = codec.load_document(file.bytes(), Some(password))?;
    codec.serialize(document)
}
