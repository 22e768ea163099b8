pub mod record_storage;
pub mod run_session_store;

pub use record_storage::{FileStorage, MemoryStorage, RecordStorage, SqliteStorage, StorageError};
pub use run_session_store::{retain_recent, RunSessionStore, MAX_SAVED_RUNS, RUN_HISTORY_KEY};
