use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Engine-wide tuning knobs, supplied by the host application.
///
/// Missing keys in JSON fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Upper bound on a single repository fetch, in milliseconds.
    pub fetch_timeout_ms: u64,

    /// Quiet period before a requested recompute actually runs, in milliseconds.
    pub debounce_ms: u64,

    /// Maximum number of dense date buckets a single chart may produce.
    pub max_buckets: usize,

    /// Bucket key for records whose grouping value is null.
    pub unspecified_label: String,

    /// Label of the single bucket when grouping is NONE and the title is blank.
    pub total_label: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 5_000,
            debounce_ms: 250,
            max_buckets: 5_000,
            unspecified_label: "Unspecified".to_string(),
            total_label: "Total".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}
