use thiserror::Error;
use uuid::Uuid;

use crate::models::field::DataSource;

/// Unified error type for the entire productivity-stats-core library.
/// Every public fallible function returns `Result<T, CoreError>`.
///
/// An empty chart is never an error: zero buckets is a valid result.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Chart configuration ─────────────────────────────────────────
    #[error("Invalid chart configuration: {0}")]
    ConfigValidation(String),

    #[error("Field '{field_id}' does not exist for data source {data_source}")]
    MissingField {
        data_source: DataSource,
        field_id: String,
    },

    // ── Record repositories ─────────────────────────────────────────
    #[error("Data source {data_source} unavailable: {reason}")]
    DataSourceUnavailable {
        data_source: DataSource,
        reason: String,
    },

    // ── Dashboard ───────────────────────────────────────────────────
    #[error("Chart not found: {0}")]
    ChartNotFound(Uuid),

    // ── Import / Export ─────────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl CoreError {
    /// `true` when the user can fix the problem by re-editing the chart.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CoreError::ConfigValidation(_) | CoreError::MissingField { .. }
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}
