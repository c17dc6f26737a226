//! Toolkit configuration

use crate::activity::DEFAULT_RETENTION;
use crate::dispatch::DEFAULT_WORKER_NAME;
use crate::materialize::DEFAULT_HANDLE_SCHEME;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Maximum number of entries kept in the activity log
    pub activity_retention: usize,

    /// Name given to each dispatch channel's worker thread
    pub worker_thread_name: String,

    /// Prefix of materialized resource URLs
    pub handle_scheme: String,

    /// Filename stem of merge output
    pub merged_file_stem: String,

    /// Default output name prefix for split
    pub split_prefix: String,

    /// Appended to the source file stem for compressed output
    pub compressed_suffix: String,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            activity_retention: DEFAULT_RETENTION,
            worker_thread_name: DEFAULT_WORKER_NAME.to_string(),
            handle_scheme: DEFAULT_HANDLE_SCHEME.to_string(),
            merged_file_stem: "paperknife-merged".to_string(),
            split_prefix: "paperknife-split".to_string(),
            compressed_suffix: "-compressed".to_string(),
        }
    }
}

impl ToolkitConfig {
    /// Load from `PAPERKNIFE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            activity_retention: lookup("PAPERKNIFE_ACTIVITY_RETENTION")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.activity_retention),
            worker_thread_name: lookup("PAPERKNIFE_WORKER_THREAD_NAME")
                .unwrap_or(defaults.worker_thread_name),
            handle_scheme: lookup("PAPERKNIFE_HANDLE_SCHEME").unwrap_or(defaults.handle_scheme),
            merged_file_stem: lookup("PAPERKNIFE_MERGED_FILE_STEM")
                .unwrap_or(defaults.merged_file_stem),
            split_prefix: lookup("PAPERKNIFE_SPLIT_PREFIX").unwrap_or(defaults.split_prefix),
            compressed_suffix: lookup("PAPERKNIFE_COMPRESSED_SUFFIX")
                .unwrap_or(defaults.compressed_suffix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ToolkitConfig::default();
        assert_eq!(config.activity_retention, 10);
        assert_eq!(config.handle_scheme, "blob:paperknife");
        assert_eq!(config.worker_thread_name, "paperknife-worker");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ToolkitConfig::from_json(r#"{"activity_retention": 3}"#).unwrap();
        assert_eq!(config.activity_retention, 3);
        assert_eq!(config.split_prefix, "paperknife-split");
    }

    #[test]
    fn test_lookup_overrides_and_ignores_bad_numbers() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PAPERKNIFE_ACTIVITY_RETENTION", "many"),
            ("PAPERKNIFE_SPLIT_PREFIX", "chapter"),
        ]);
        let config = ToolkitConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.activity_retention, 10);
        assert_eq!(config.split_prefix, "chapter");
        assert_eq!(config.merged_file_stem, "paperknife-merged");
    }
}
