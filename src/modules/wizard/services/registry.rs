use super::state_machine::ScenarioWizard;
use crate::core::{AppError, Result};
use crate::modules::runs::repositories::RunSessionStore;
use crate::modules::runs::services::{ScenarioExecutor, StepStream, SubmissionRateLimiter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub type SharedWizard = Arc<Mutex<ScenarioWizard>>;

/// Independent wizard sessions sharing one limiter, history store and executor
#[derive(Clone)]
pub struct WizardRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SharedWizard>>>,
    limiter: SubmissionRateLimiter,
    store: RunSessionStore,
    executor: Arc<dyn ScenarioExecutor>,
}

impl WizardRegistry {
    pub fn new(
        limiter: SubmissionRateLimiter,
        store: RunSessionStore,
        executor: Arc<dyn ScenarioExecutor>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            limiter,
            store,
            executor,
        }
    }

    pub fn store(&self) -> &RunSessionStore {
        &self.store
    }

    pub fn limiter(&self) -> &SubmissionRateLimiter {
        &self.limiter
    }

    /// Creates a wizard already opened on the scenario step
    pub async fn create(&self) -> Result<(Uuid, SharedWizard)> {
        let mut wizard = ScenarioWizard::new(
            self.limiter.clone(),
            self.store.clone(),
            Arc::clone(&self.executor),
        );
        wizard.open()?;

        let id = Uuid::new_v4();
        let shared = Arc::new(Mutex::new(wizard));
        self.sessions.write().await.insert(id, Arc::clone(&shared));
        tracing::info!(session_id = %id, "Wizard session opened");
        Ok((id, shared))
    }

    pub async fn get(&self, id: Uuid) -> Result<SharedWizard> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Wizard session '{}'", id)))
    }

    /// Removes the session and abandons any run it was following
    pub async fn close(&self, id: Uuid) -> Result<()> {
        let wizard = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| AppError::not_found(format!("Wizard session '{}'", id)))?;

        wizard.lock().await.reset().await;
        tracing::info!(session_id = %id, "Wizard session closed");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Feeds a run's step stream into a shared wizard until the run ends
///
/// The wizard lock is only held while a step is applied. If the wizard was
/// reset or moved on to another run, remaining steps are discarded; a reset
/// also releases the stream, which ends this loop.
pub async fn drive_run(wizard: SharedWizard, run_key: String, mut steps: StepStream) {
    while let Some(step) = steps.recv().await {
        let mut guard = wizard.lock().await;
        if !guard.is_current_run(&run_key) {
            tracing::debug!(run_key = %run_key, "Wizard no longer observes run, dropping steps");
            return;
        }
        if guard.apply_step(step).await.is_terminal() {
            return;
        }
    }

    let mut guard = wizard.lock().await;
    if guard.is_current_run(&run_key) {
        guard.close_stream().await;
    } else {
        tracing::debug!(run_key = %run_key, "Step stream released");
    }
}
