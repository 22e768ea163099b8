// Stand-ins for the automation engine.

use async_trait::async_trait;
use paylab::core::{AppError, Result};
use paylab::modules::runs::models::{RunContext, RunStep};
use paylab::modules::runs::services::{Launch, ScenarioExecutor, StepRouter};
use paylab::modules::wizard::models::StartPayload;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Replays a fixed list of steps, then closes the stream
#[derive(Default)]
pub struct ScriptedExecutor {
    steps: Vec<RunStep>,
    launches: AtomicUsize,
    payloads: Mutex<Vec<StartPayload>>,
}

impl ScriptedExecutor {
    pub fn new(steps: Vec<RunStep>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<StartPayload> {
        self.payloads.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ScenarioExecutor for ScriptedExecutor {
    async fn launch(&self, _run_key: &str, payload: &StartPayload) -> Result<Launch> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());

        let (tx, rx) = mpsc::channel(self.steps.len().max(1));
        for step in &self.steps {
            tx.send(step.clone()).await.unwrap();
        }
        Ok(Launch {
            context: RunContext {
                base_url: Some("http://automation.test".to_string()),
                launch_url: Some("http://automation.test/start".to_string()),
            },
            steps: rx,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Hands each launched run's sender to the test so steps can be fed live
#[derive(Default, Clone)]
pub struct ChannelExecutor {
    senders: Arc<Mutex<Vec<(String, mpsc::Sender<RunStep>)>>>,
}

impl ChannelExecutor {
    pub fn sender(&self, index: usize) -> mpsc::Sender<RunStep> {
        self.senders.lock().unwrap()[index].1.clone()
    }

    pub fn run_key(&self, index: usize) -> String {
        self.senders.lock().unwrap()[index].0.clone()
    }

    /// Drops every sender, closing all streams
    pub fn close_all(&self) {
        self.senders.lock().unwrap().clear();
    }
}

#[async_trait]
impl ScenarioExecutor for ChannelExecutor {
    async fn launch(&self, run_key: &str, _payload: &StartPayload) -> Result<Launch> {
        let (tx, rx) = mpsc::channel(16);
        self.senders
            .lock()
            .unwrap()
            .push((run_key.to_string(), tx));
        Ok(Launch {
            context: RunContext::default(),
            steps: rx,
        })
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Opens the callback route like the webhook executor does before posting,
/// and releases it when the run is abandoned
#[derive(Clone)]
pub struct RoutedExecutor {
    router: StepRouter,
}

impl RoutedExecutor {
    pub fn new(router: StepRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl ScenarioExecutor for RoutedExecutor {
    async fn launch(&self, run_key: &str, _payload: &StartPayload) -> Result<Launch> {
        Ok(Launch {
            context: RunContext {
                base_url: None,
                launch_url: Some("http://automation.test/start".to_string()),
            },
            steps: self.router.register(run_key).await,
        })
    }

    async fn abandon(&self, run_key: &str) {
        self.router.remove(run_key).await;
    }

    fn name(&self) -> &str {
        "routed"
    }
}

/// Engine that refuses every launch
pub struct FailingExecutor;

#[async_trait]
impl ScenarioExecutor for FailingExecutor {
    async fn launch(&self, _run_key: &str, _payload: &StartPayload) -> Result<Launch> {
        Err(AppError::execution("automation webhook returned 503"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
