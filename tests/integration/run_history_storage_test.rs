#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::UnavailableStorage;
use paylab::config::{StorageBackend, StorageConfig};
use paylab::modules::runs::models::{RunData, RunStatus, RunStep, SavedRun, StepStatus};
use paylab::modules::runs::repositories::{
    FileStorage, RecordStorage, RunSessionStore, SqliteStorage, RUN_HISTORY_KEY,
};
use std::sync::Arc;

fn failed_run(key: &str) -> SavedRun {
    let mut run = RunData::start(None);
    run.push_step(RunStep::new(1, "create payment", StepStatus::Running));
    run.push_step(RunStep::new(2, "capture", StepStatus::Error).with_message("timeout at bank"));
    SavedRun::new(key, run)
}

#[tokio::test]
async fn test_file_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let store = RunSessionStore::new(Arc::new(FileStorage::new(dir.path())));
    store.append(failed_run("first")).await;
    store.append(failed_run("second")).await;

    let reopened = RunSessionStore::new(Arc::new(FileStorage::new(dir.path())));
    let runs = reopened.load_all().await;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_key, "second");
    assert_eq!(runs[1].run.status, RunStatus::Error);
    assert_eq!(runs[1].run.error_message(), Some("timeout at bank"));

    assert!(dir.path().join(format!("{}.json", RUN_HISTORY_KEY)).exists());
}

#[tokio::test]
async fn test_corrupt_file_loads_empty_then_recovers() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(format!("{}.json", RUN_HISTORY_KEY)),
        "[{\"runKey\": \"half-writ",
    )
    .unwrap();

    let store = RunSessionStore::new(Arc::new(FileStorage::new(dir.path())));
    assert!(store.load_all().await.is_empty());

    store.append(failed_run("after-corruption")).await;
    assert_eq!(store.load_all().await[0].run_key, "after-corruption");
}

#[tokio::test]
async fn test_sqlite_history_round_trip() {
    let storage = SqliteStorage::connect("sqlite::memory:").await.unwrap();
    let store = RunSessionStore::new(Arc::new(storage));

    for i in 0..7 {
        store.append(failed_run(&format!("sq-{i}"))).await;
    }

    let runs = store.load_all().await;
    assert_eq!(runs.len(), 5);
    assert_eq!(runs[0].run_key, "sq-6");
    assert_eq!(runs[4].run_key, "sq-2");
    assert_eq!(store.backend(), "sqlite");
}

#[tokio::test]
async fn test_sqlite_backend_from_config_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("history.db");
    let config = StorageConfig {
        backend: StorageBackend::Sqlite,
        dir: dir.path().to_path_buf(),
        database_url: format!("sqlite://{}", db_path.display()),
    };

    let store = config.build_store().await.unwrap();
    store.append(failed_run("persisted")).await;
    assert!(db_path.exists());

    let reopened = config.build_store().await.unwrap();
    assert_eq!(reopened.load_all().await[0].run_key, "persisted");
}

#[tokio::test]
async fn test_unavailable_storage_is_silent() {
    let storage = Arc::new(UnavailableStorage::default());
    let store = RunSessionStore::new(storage.clone());

    store.append(failed_run("lost")).await;
    assert!(store.load_all().await.is_empty());
    assert_eq!(storage.write_attempts(), 1);
    assert!(storage.read(RUN_HISTORY_KEY).await.is_err());
}
