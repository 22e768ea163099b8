use crate::core::{AppError, Result};
use crate::modules::runs::models::RunStep;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Ordered stream of steps for one run; closes after the terminal step
pub type StepStream = mpsc::Receiver<RunStep>;

const DEFAULT_BUFFER: usize = 64;

/// Routes step callbacks to the stream of the run they belong to
#[derive(Clone)]
pub struct StepRouter {
    routes: Arc<RwLock<HashMap<String, mpsc::Sender<RunStep>>>>,
    buffer: usize,
}

impl Default for StepRouter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl StepRouter {
    pub fn new(buffer: usize) -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    /// Opens the stream for `run_key`, replacing any previous route
    pub async fn register(&self, run_key: &str) -> StepStream {
        let (tx, rx) = mpsc::channel(self.buffer);
        if self
            .routes
            .write()
            .await
            .insert(run_key.to_string(), tx)
            .is_some()
        {
            tracing::warn!(run_key = %run_key, "Replaced existing step route");
        }
        rx
    }

    /// Drops the route, closing its stream; false when there was none
    pub async fn remove(&self, run_key: &str) -> bool {
        self.routes.write().await.remove(run_key).is_some()
    }

    pub async fn is_registered(&self, run_key: &str) -> bool {
        self.routes.read().await.contains_key(run_key)
    }

    pub async fn active_routes(&self) -> usize {
        self.routes.read().await.len()
    }

    /// Forwards `step` to its run; the route is dropped after a terminal step
    pub async fn dispatch(&self, run_key: &str, step: RunStep) -> Result<()> {
        let sender = self
            .routes
            .read()
            .await
            .get(run_key)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("No active run '{}'", run_key)))?;

        let terminal = step.is_terminal();
        let seq = step.seq;

        if sender.send(step).await.is_err() {
            // Receiver gone: nobody observes this run anymore
            self.remove(run_key).await;
            return Err(AppError::not_found(format!(
                "Run '{}' is no longer observed",
                run_key
            )));
        }

        tracing::debug!(run_key = %run_key, seq, terminal, "Step routed");

        if terminal {
            self.remove(run_key).await;
        }

        Ok(())
    }
}
