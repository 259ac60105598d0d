use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::CoreError;
use crate::models::field::DataSource;
use crate::models::record::Record;
use crate::services::time_range::ResolvedTimeRange;

/// Published by a repository whenever its records change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChanged {
    pub data_source: DataSource,
}

/// Read-only access to the records of one data source.
///
/// Each data source (tasks, XP transactions, categories, calendar events)
/// is served by one implementation. The engine only ever reads, so an
/// implementation can be swapped without touching the computation code.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Human-readable name of this repository (for logs/errors).
    fn name(&self) -> &str;

    /// The data source this repository serves.
    fn data_source(&self) -> DataSource;

    /// Fetch a snapshot of all records.
    ///
    /// `time_range_hint` lets an implementation skip records it knows are
    /// out of range. The engine filters again, so ignoring it is fine.
    async fn fetch(
        &self,
        time_range_hint: Option<ResolvedTimeRange>,
    ) -> Result<Vec<Record>, CoreError>;

    /// Subscribe to change notifications, if this repository publishes any.
    fn subscribe(&self) -> Option<broadcast::Receiver<DataChanged>> {
        None
    }
}

/// Lets the host keep a handle to a repository it registered, e.g. to
/// push new records into it.
#[async_trait]
impl<T: RecordRepository + ?Sized> RecordRepository for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn data_source(&self) -> DataSource {
        (**self).data_source()
    }

    async fn fetch(
        &self,
        time_range_hint: Option<ResolvedTimeRange>,
    ) -> Result<Vec<Record>, CoreError> {
        (**self).fetch(time_range_hint).await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<DataChanged>> {
        (**self).subscribe()
    }
}
