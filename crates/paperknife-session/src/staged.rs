//! Ordered list of staged inputs with stable identifiers

use crate::error::SessionError;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a staged input, unaffected by reordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FileId(Uuid);

impl FileId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct StagedList<T> {
    entries: Vec<(FileId, T)>,
}

impl<T> Default for StagedList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> StagedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T) -> FileId {
        let id = FileId::new();
        self.entries.push((id, item));
        id
    }

    pub fn remove(&mut self, id: FileId) -> Result<T, SessionError> {
        let position = self.position(id)?;
        Ok(self.entries.remove(position).1)
    }

    /// Move an entry to `new_index`, clamped to the last position
    pub fn reorder(&mut self, id: FileId, new_index: usize) -> Result<(), SessionError> {
        let position = self.position(id)?;
        let entry = self.entries.remove(position);
        let target = new_index.min(self.entries.len());
        self.entries.insert(target, entry);
        Ok(())
    }

    pub fn get(&self, id: FileId) -> Option<&T> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, item)| item)
    }

    /// Replace an entry in place, keeping its id and position
    pub fn replace(&mut self, id: FileId, f: impl FnOnce(T) -> T) -> Result<(), SessionError>
    where
        T: Clone,
    {
        let position = self.position(id)?;
        let updated = f(self.entries[position].1.clone());
        self.entries[position].1 = updated;
        Ok(())
    }

    pub fn ids(&self) -> Vec<FileId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, id: FileId) -> Result<usize, SessionError> {
        self.entries
            .iter()
            .position(|(entry_id, _)| *entry_id == id)
            .ok_or(SessionError::UnknownFile(id))
    }
}
