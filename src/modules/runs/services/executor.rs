use super::step_router::{StepRouter, StepStream};
use crate::core::{AppError, Result};
use crate::modules::runs::models::RunContext;
use crate::modules::wizard::models::StartPayload;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An accepted launch: where it runs and the steps it will report
pub struct Launch {
    pub context: RunContext,
    pub steps: StepStream,
}

/// The external system that actually executes payment scenarios
#[async_trait]
pub trait ScenarioExecutor: Send + Sync {
    /// Starts a run; the returned stream yields its steps in order
    async fn launch(&self, run_key: &str, payload: &StartPayload) -> Result<Launch>;

    /// Stops delivering steps for a run nobody observes anymore
    ///
    /// Closing the stream is all this does; the external run is not cancelled.
    async fn abandon(&self, _run_key: &str) {}

    /// Executor name for logs
    fn name(&self) -> &str;
}

/// Launches runs by posting to the automation engine's webhook
///
/// The engine reports progress by calling back into
/// `{callback_base_url}/api/runs/{run_key}/steps`; those calls are routed
/// into the stream returned here.
pub struct WebhookExecutor {
    client: Client,
    webhook_url: String,
    callback_base_url: String,
    router: StepRouter,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LaunchRequest<'a> {
    run_key: &'a str,
    callback_url: String,
    payload: &'a StartPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LaunchAck {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    launch_url: Option<String>,
}

impl WebhookExecutor {
    pub fn new(
        webhook_url: impl Into<String>,
        callback_base_url: impl Into<String>,
        timeout: Duration,
        router: StepRouter,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            callback_base_url: callback_base_url.into().trim_end_matches('/').to_string(),
            router,
        })
    }

    pub fn callback_url(&self, run_key: &str) -> String {
        format!("{}/api/runs/{}/steps", self.callback_base_url, run_key)
    }

    async fn post_launch(&self, run_key: &str, payload: &StartPayload) -> Result<RunContext> {
        let request = LaunchRequest {
            run_key,
            callback_url: self.callback_url(run_key),
            payload,
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AppError::execution(format!(
                "automation webhook returned {}: {}",
                status, body
            )));
        }

        // The engine may answer with an empty body
        let ack: LaunchAck = serde_json::from_str(&body).unwrap_or_default();

        Ok(RunContext {
            base_url: ack.base_url,
            launch_url: ack.launch_url.or_else(|| Some(self.webhook_url.clone())),
        })
    }
}

#[async_trait]
impl ScenarioExecutor for WebhookExecutor {
    async fn launch(&self, run_key: &str, payload: &StartPayload) -> Result<Launch> {
        // Route first so no early callback is lost
        let steps = self.router.register(run_key).await;

        match self.post_launch(run_key, payload).await {
            Ok(context) => {
                tracing::info!(
                    run_key = %run_key,
                    env = %payload.env,
                    actions = ?payload.actions,
                    "Run launched on automation engine"
                );
                Ok(Launch { context, steps })
            }
            Err(e) => {
                self.router.remove(run_key).await;
                tracing::error!(run_key = %run_key, error = %e, "Run launch failed");
                Err(e)
            }
        }
    }

    async fn abandon(&self, run_key: &str) {
        if self.router.remove(run_key).await {
            tracing::info!(run_key = %run_key, "Step route released for abandoned run");
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
