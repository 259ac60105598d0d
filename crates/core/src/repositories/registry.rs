use tokio::sync::broadcast;

use crate::models::field::DataSource;

use super::traits::{DataChanged, RecordRepository};

/// Registry of the record repositories available to the engine.
///
/// Routes fetches to the repository owning a `DataSource`. The first
/// repository registered for a source wins.
pub struct RepositoryRegistry {
    repositories: Vec<Box<dyn RecordRepository>>,
}

impl RepositoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            repositories: Vec::new(),
        }
    }

    /// Register a repository.
    pub fn register(&mut self, repository: Box<dyn RecordRepository>) {
        self.repositories.push(repository);
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, repository: Box<dyn RecordRepository>) -> Self {
        self.register(repository);
        self
    }

    /// Find the repository serving `data_source`.
    pub fn get_repository_for(&self, data_source: DataSource) -> Option<&dyn RecordRepository> {
        self.repositories
            .iter()
            .find(|r| r.data_source() == data_source)
            .map(|r| r.as_ref())
    }

    /// Change subscriptions of every repository that publishes them.
    pub fn subscribe_all(&self) -> Vec<broadcast::Receiver<DataChanged>> {
        self.repositories
            .iter()
            .filter_map(|r| r.subscribe())
            .collect()
    }
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
