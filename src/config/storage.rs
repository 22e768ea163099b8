use crate::core::{AppError, Result};
use crate::modules::runs::repositories::{
    FileStorage, MemoryStorage, RecordStorage, RunSessionStore, SqliteStorage,
};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Where run history is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(AppError::Configuration(format!(
                "Unknown RUN_HISTORY_BACKEND '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub dir: PathBuf,
    pub database_url: String,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        Ok(StorageConfig {
            backend: env::var("RUN_HISTORY_BACKEND")
                .unwrap_or_else(|_| "file".to_string())
                .parse()?,
            dir: env::var("RUN_HISTORY_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),
            database_url: env::var("RUN_HISTORY_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/run_history.db".to_string()),
        })
    }

    /// Opens the configured backend and wraps it in a history store
    pub async fn build_store(&self) -> Result<RunSessionStore> {
        let storage: Arc<dyn RecordStorage> = match self.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::File => Arc::new(FileStorage::new(&self.dir)),
            StorageBackend::Sqlite => {
                if let Some(parent) = sqlite_parent_dir(&self.database_url) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AppError::Configuration(format!(
                            "Cannot create run history directory: {}",
                            e
                        ))
                    })?;
                }
                let storage = SqliteStorage::connect(&self.database_url)
                    .await
                    .map_err(|e| {
                        AppError::Configuration(format!("Cannot open run history database: {}", e))
                    })?;
                Arc::new(storage)
            }
        };

        tracing::info!(backend = storage.name(), "Run history storage ready");
        Ok(RunSessionStore::new(storage))
    }
}

/// Directory holding a file-backed sqlite url, if any
fn sqlite_parent_dir(url: &str) -> Option<&Path> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
}
