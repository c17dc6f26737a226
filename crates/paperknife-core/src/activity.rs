//! Recent-activity log
//!
//! Append-only record of completed operations with a retention cap; the
//! oldest entries are evicted once the cap is exceeded.

use crate::config::ToolkitConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

pub const DEFAULT_RETENTION: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    Merge,
    Split,
    Compress,
    ImageToPdf,
    Unlock,
    Signature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: Uuid,
    pub name: String,
    pub tool: ToolKind,
    pub timestamp: DateTime<Utc>,
    pub size_bytes: usize,
    pub result_url: Option<String>,
}

/// What a finished operation reports to the log
#[derive(Debug, Clone)]
pub struct Completion {
    pub name: String,
    pub tool: ToolKind,
    pub size_bytes: usize,
    pub result_url: Option<String>,
}

#[derive(Debug)]
pub struct ActivityLog {
    retention: usize,
    entries: VecDeque<ActivityEntry>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl ActivityLog {
    pub fn with_retention(retention: usize) -> Self {
        Self {
            retention,
            entries: VecDeque::new(),
        }
    }

    pub fn from_config(config: &ToolkitConfig) -> Self {
        Self::with_retention(config.activity_retention)
    }

    pub fn record_completion(&mut self, completion: Completion) -> &ActivityEntry {
        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            name: completion.name,
            tool: completion.tool,
            timestamp: Utc::now(),
            size_bytes: completion.size_bytes,
            result_url: completion.result_url,
        };

        self.entries.push_front(entry);
        self.entries.truncate(self.retention.max(1));
        &self.entries[0]
    }

    /// Most recent first
    pub fn list_recent(&self, limit: usize) -> Vec<ActivityEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
