use super::record_storage::{RecordStorage, StorageError};
use crate::modules::runs::models::SavedRun;
use std::sync::Arc;

/// Number of runs kept in history
pub const MAX_SAVED_RUNS: usize = 5;

/// Storage key of the history record
pub const RUN_HISTORY_KEY: &str = "payment-test-runs";

/// Bounded, most-recent-first history of finished runs
///
/// History is best-effort: unreadable or corrupt data loads as empty, and
/// failed writes are logged and dropped. Concurrent appends are
/// last-write-wins.
#[derive(Clone)]
pub struct RunSessionStore {
    storage: Arc<dyn RecordStorage>,
    key: String,
}

impl RunSessionStore {
    pub fn new(storage: Arc<dyn RecordStorage>) -> Self {
        Self::with_key(storage, RUN_HISTORY_KEY)
    }

    pub fn with_key(storage: Arc<dyn RecordStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Name of the storage backend
    pub fn backend(&self) -> &str {
        self.storage.name()
    }

    /// Whether the backend is reachable; history itself never fails
    pub async fn check(&self) -> Result<(), StorageError> {
        self.storage.ping().await
    }

    /// Persisted runs, most recent first
    pub async fn load_all(&self) -> Vec<SavedRun> {
        let raw = match self.storage.read(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(
                    backend = self.storage.name(),
                    error = %e,
                    "Run history unreadable, treating as empty"
                );
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<SavedRun>>(&raw).map_err(StorageError::from) {
            Ok(mut runs) => {
                runs.truncate(MAX_SAVED_RUNS);
                runs
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.storage.name(),
                    error = %e,
                    "Run history corrupt, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Prepends `run` and keeps the newest `MAX_SAVED_RUNS` entries
    pub async fn append(&self, run: SavedRun) {
        let run_key = run.run_key.clone();
        let runs = retain_recent(self.load_all().await, run);

        let serialized = match serde_json::to_string(&runs).map_err(StorageError::from) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::warn!(run_key = %run_key, error = %e, "Failed to serialize run history");
                return;
            }
        };

        match self.storage.write(&self.key, &serialized).await {
            Ok(()) => tracing::debug!(
                run_key = %run_key,
                backend = self.storage.name(),
                entries = runs.len(),
                "Run saved to history"
            ),
            Err(e) => tracing::warn!(
                run_key = %run_key,
                backend = self.storage.name(),
                error = %e,
                "Run history write failed, skipping"
            ),
        }
    }
}

/// `run` followed by the newest entries of `existing`, capped at `MAX_SAVED_RUNS`
pub fn retain_recent(existing: Vec<SavedRun>, run: SavedRun) -> Vec<SavedRun> {
    let mut runs = Vec::with_capacity(MAX_SAVED_RUNS);
    runs.push(run);
    runs.extend(existing.into_iter().take(MAX_SAVED_RUNS - 1));
    runs
}
