use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::errors::CoreError;
use crate::models::field::DataSource;
use crate::models::record::Record;
use crate::services::time_range::ResolvedTimeRange;

use super::traits::{DataChanged, RecordRepository};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Snapshot-based repository kept in memory.
///
/// Readers get the current snapshot; writers swap in a new one and
/// publish `DataChanged`. A fetch in progress keeps working on the
/// snapshot it started with.
pub struct InMemoryRepository {
    data_source: DataSource,
    records: RwLock<Arc<Vec<Record>>>,
    changes: broadcast::Sender<DataChanged>,
}

impl InMemoryRepository {
    pub fn new(data_source: DataSource) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            data_source,
            records: RwLock::new(Arc::new(Vec::new())),
            changes,
        }
    }

    pub fn with_records(data_source: DataSource, records: Vec<Record>) -> Self {
        let repo = Self::new(data_source);
        *repo.records.write() = Arc::new(records);
        repo
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Vec<Record>> {
        Arc::clone(&self.records.read())
    }

    /// Replace every record and notify subscribers.
    pub fn replace(&self, records: Vec<Record>) {
        *self.records.write() = Arc::new(records);
        self.notify();
    }

    /// Append one record and notify subscribers.
    pub fn push(&self, record: impl Into<Record>) {
        {
            let mut guard = self.records.write();
            let mut next = Vec::clone(&guard);
            next.push(record.into());
            *guard = Arc::new(next);
        }
        self.notify();
    }

    fn notify(&self) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.changes.send(DataChanged {
            data_source: self.data_source,
        });
    }
}

#[async_trait]
impl RecordRepository for InMemoryRepository {
    fn name(&self) -> &str {
        "InMemory"
    }

    fn data_source(&self) -> DataSource {
        self.data_source
    }

    async fn fetch(
        &self,
        _time_range_hint: Option<ResolvedTimeRange>,
    ) -> Result<Vec<Record>, CoreError> {
        Ok(self.snapshot().as_ref().clone())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<DataChanged>> {
        Some(self.changes.subscribe())
    }
}
