use super::validator;
use crate::core::{AppError, FieldError, RateLimitError, Result, ValidationErrors};
use crate::modules::runs::models::{
    IgnoreReason, RunData, RunStatus, RunStep, SavedRun, StepOutcome, StepStatus,
};
use crate::modules::runs::repositories::RunSessionStore;
use crate::modules::runs::services::{
    Launch, ScenarioExecutor, StepStream, SubmissionRateLimiter,
};
use crate::modules::scenarios::{Scenario, ScenarioSelection};
use crate::modules::wizard::models::{DraftUpdate, StartPayload, WizardData};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Message recorded when the engine stops reporting before a terminal step
pub const STREAM_CLOSED_MESSAGE: &str = "step stream closed before a terminal step";

/// Where the operator is in the scenario wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardState {
    Idle,
    CollectingScenario,
    CollectingEnvironment,
    CollectingApplication,
    CollectingCards,
    /// Only entered when CANCEL or REFUND needs a prior payment
    CollectingActionDetail,
    ReadyToSubmit,
    /// The launch request is in flight; the wizard is not locked meanwhile
    Launching,
    Running,
    Completed,
    Failed,
}

impl WizardState {
    pub fn is_collecting(&self) -> bool {
        matches!(
            self,
            WizardState::CollectingScenario
                | WizardState::CollectingEnvironment
                | WizardState::CollectingApplication
                | WizardState::CollectingCards
                | WizardState::CollectingActionDetail
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardState::Completed | WizardState::Failed)
    }
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WizardState::Idle => "idle",
            WizardState::CollectingScenario => "collecting scenario",
            WizardState::CollectingEnvironment => "collecting environment",
            WizardState::CollectingApplication => "collecting application",
            WizardState::CollectingCards => "collecting cards",
            WizardState::CollectingActionDetail => "collecting action detail",
            WizardState::ReadyToSubmit => "ready to submit",
            WizardState::Launching => "launching",
            WizardState::Running => "running",
            WizardState::Completed => "completed",
            WizardState::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Serializable view of a wizard for the UI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub state: WizardState,
    pub data: WizardData,
    pub pending_fields: Vec<FieldError>,
    pub payload: Option<StartPayload>,
    pub run_key: Option<String>,
    pub run: Option<RunData>,
    pub can_proceed: bool,
    pub remaining_wait_ms: u64,
}

/// A launch claimed by [`ScenarioWizard::begin_submit`]
///
/// Runs through the limiter and the executor without borrowing the wizard,
/// so the session stays readable while the engine answers.
pub struct PendingLaunch {
    run_key: String,
    payload: StartPayload,
    limiter: SubmissionRateLimiter,
    executor: Arc<dyn ScenarioExecutor>,
}

/// Result of a [`PendingLaunch`], handed back to [`ScenarioWizard::finish_submit`]
pub struct LaunchAttempt {
    run_key: String,
    result: std::result::Result<Result<Launch>, RateLimitError>,
}

impl PendingLaunch {
    pub fn run_key(&self) -> &str {
        &self.run_key
    }

    pub async fn launch(self) -> LaunchAttempt {
        let PendingLaunch {
            run_key,
            payload,
            limiter,
            executor,
        } = self;

        let launch_key = run_key.clone();
        let result = limiter
            .execute(move || async move { executor.launch(&launch_key, &payload).await })
            .await;

        LaunchAttempt { run_key, result }
    }
}

/// Scenario wizard: collects a run configuration step by step, then
/// launches it and tracks its steps to a terminal status.
///
/// One instance drives at most one run at a time. Finished runs are handed
/// to the [`RunSessionStore`].
pub struct ScenarioWizard {
    state: WizardState,
    data: WizardData,
    payload: Option<StartPayload>,
    run_key: Option<String>,
    run: Option<RunData>,
    limiter: SubmissionRateLimiter,
    store: RunSessionStore,
    executor: Arc<dyn ScenarioExecutor>,
}

impl ScenarioWizard {
    pub fn new(
        limiter: SubmissionRateLimiter,
        store: RunSessionStore,
        executor: Arc<dyn ScenarioExecutor>,
    ) -> Self {
        Self {
            state: WizardState::Idle,
            data: WizardData::default(),
            payload: None,
            run_key: None,
            run: None,
            limiter,
            store,
            executor,
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn data(&self) -> &WizardData {
        &self.data
    }

    pub fn payload(&self) -> Option<&StartPayload> {
        self.payload.as_ref()
    }

    pub fn run(&self) -> Option<&RunData> {
        self.run.as_ref()
    }

    pub fn run_key(&self) -> Option<&str> {
        self.run_key.as_deref()
    }

    pub fn is_current_run(&self, run_key: &str) -> bool {
        self.run_key.as_deref() == Some(run_key)
    }

    pub fn limiter(&self) -> &SubmissionRateLimiter {
        &self.limiter
    }

    /// Starts a fresh draft
    pub fn open(&mut self) -> Result<WizardState> {
        if self.state != WizardState::Idle {
            return Err(AppError::invalid_transition(format!(
                "cannot open wizard while {}",
                self.state
            )));
        }
        self.data = WizardData::default();
        self.state = WizardState::CollectingScenario;
        Ok(self.state)
    }

    /// Drops the draft and any observed run
    ///
    /// A run that is still executing externally keeps going; its step stream
    /// is released so nothing keeps waiting on it.
    pub async fn reset(&mut self) {
        if matches!(self.state, WizardState::Running | WizardState::Launching) {
            if let Some(run_key) = self.run_key.as_deref() {
                tracing::info!(run_key = %run_key, state = %self.state, "Abandoning run");
                self.executor.abandon(run_key).await;
            }
        }
        self.state = WizardState::Idle;
        self.data = WizardData::default();
        self.payload = None;
        self.run_key = None;
        self.run = None;
    }

    pub fn toggle_scenario(&mut self, scenario: Scenario) -> Result<&ScenarioSelection> {
        if self.state != WizardState::CollectingScenario {
            return Err(AppError::invalid_transition(format!(
                "scenarios can only change while collecting scenario, not while {}",
                self.state
            )));
        }
        self.data.scenarios.toggle(scenario);
        Ok(&self.data.scenarios)
    }

    pub fn update_draft(&mut self, update: DraftUpdate) -> Result<()> {
        if !self.state.is_collecting() {
            return Err(AppError::invalid_transition(format!(
                "cannot edit {} while {}",
                update.label(),
                self.state
            )));
        }
        self.data.apply(update);
        Ok(())
    }

    /// Fields the current step still needs
    pub fn pending_fields(&self) -> ValidationErrors {
        match self.state {
            WizardState::CollectingScenario => validator::validate_scenarios(&self.data),
            WizardState::CollectingEnvironment => validator::validate_environment(&self.data),
            WizardState::CollectingApplication => validator::validate_application(&self.data),
            WizardState::CollectingCards => validator::validate_cards(&self.data),
            WizardState::CollectingActionDetail => validator::validate_action_detail(&self.data),
            _ => ValidationErrors::new(),
        }
    }

    fn after_cards(&self) -> WizardState {
        if self.data.scenarios.requires_candidate() {
            WizardState::CollectingActionDetail
        } else {
            WizardState::ReadyToSubmit
        }
    }

    /// Validates the current step and moves to the next one
    pub fn advance(&mut self) -> Result<WizardState> {
        let next = match self.state {
            WizardState::CollectingScenario => WizardState::CollectingEnvironment,
            WizardState::CollectingEnvironment => WizardState::CollectingApplication,
            WizardState::CollectingApplication => WizardState::CollectingCards,
            WizardState::CollectingCards => self.after_cards(),
            WizardState::CollectingActionDetail => WizardState::ReadyToSubmit,
            WizardState::Running | WizardState::Launching => {
                return Err(AppError::invalid_transition("a run is already in progress"))
            }
            other => {
                return Err(AppError::invalid_transition(format!(
                    "nothing to advance while {}",
                    other
                )))
            }
        };

        self.pending_fields().into_result()?;

        if next == WizardState::ReadyToSubmit {
            self.payload = Some(validator::build_start_payload(&self.data)?);
        }

        tracing::debug!(from = %self.state, to = %next, "Wizard advanced");
        self.state = next;
        Ok(next)
    }

    /// Returns to the previous collecting step
    pub fn back(&mut self) -> Result<WizardState> {
        let previous = match self.state {
            WizardState::CollectingEnvironment => WizardState::CollectingScenario,
            WizardState::CollectingApplication => WizardState::CollectingEnvironment,
            WizardState::CollectingCards => WizardState::CollectingApplication,
            WizardState::CollectingActionDetail => WizardState::CollectingCards,
            WizardState::ReadyToSubmit => {
                if self.data.scenarios.requires_candidate() {
                    WizardState::CollectingActionDetail
                } else {
                    WizardState::CollectingCards
                }
            }
            other => {
                return Err(AppError::invalid_transition(format!(
                    "cannot go back while {}",
                    other
                )))
            }
        };

        self.payload = None;
        self.state = previous;
        Ok(previous)
    }

    /// True when `submit` would pass both the state check and the limiter
    pub fn can_submit(&self) -> bool {
        self.state == WizardState::ReadyToSubmit && self.limiter.can_proceed()
    }

    /// Launches the prepared payload through the rate limiter
    ///
    /// On a limiter rejection the wizard stays in `ReadyToSubmit`. On a launch
    /// failure the run is recorded as failed and persisted.
    pub async fn submit(&mut self) -> Result<StepStream> {
        let pending = self.begin_submit()?;
        let attempt = pending.launch().await;
        self.finish_submit(attempt).await
    }

    /// Claims the prepared payload and moves to `Launching`
    pub fn begin_submit(&mut self) -> Result<PendingLaunch> {
        match self.state {
            WizardState::ReadyToSubmit => {}
            WizardState::Running | WizardState::Launching => {
                return Err(AppError::invalid_transition("a run is already in progress"))
            }
            other => {
                return Err(AppError::invalid_transition(format!(
                    "cannot submit while {}",
                    other
                )))
            }
        }

        let payload = self
            .payload
            .clone()
            .ok_or_else(|| AppError::internal("ready to submit without a payload"))?;
        let run_key = uuid::Uuid::new_v4().to_string();

        self.run_key = Some(run_key.clone());
        self.state = WizardState::Launching;

        Ok(PendingLaunch {
            run_key,
            payload,
            limiter: self.limiter.clone(),
            executor: Arc::clone(&self.executor),
        })
    }

    /// Applies the outcome of a launch started by [`Self::begin_submit`]
    ///
    /// If the wizard was reset while the launch was in flight, an accepted
    /// run is abandoned right away.
    pub async fn finish_submit(&mut self, attempt: LaunchAttempt) -> Result<StepStream> {
        let LaunchAttempt { run_key, result } = attempt;

        if self.state != WizardState::Launching || !self.is_current_run(&run_key) {
            if matches!(result, Ok(Ok(_))) {
                self.executor.abandon(&run_key).await;
            }
            return Err(AppError::invalid_transition(
                "wizard was reset while the run was launching",
            ));
        }

        match result {
            Err(rejected) => {
                tracing::warn!(
                    wait_ms = rejected.remaining_ms(),
                    "Submission gated by rate limiter"
                );
                self.run_key = None;
                self.state = WizardState::ReadyToSubmit;
                Err(rejected.into())
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                let mut run = RunData::start(None);
                run.push_step(RunStep::new(1, "launch", StepStatus::Error).with_message(&message));
                self.run = Some(run);
                self.state = WizardState::Failed;
                self.persist().await;
                Err(AppError::Execution(message))
            }
            Ok(Ok(launch)) => {
                tracing::info!(
                    run_key = %run_key,
                    executor = self.executor.name(),
                    "Run started"
                );
                self.run = Some(RunData::start(Some(launch.context)));
                self.state = WizardState::Running;
                Ok(launch.steps)
            }
        }
    }

    /// Records one step of the current run
    ///
    /// The first terminal step decides the outcome; anything after it is ignored.
    pub async fn apply_step(&mut self, step: RunStep) -> StepOutcome {
        let seq = step.seq;
        let outcome = match (self.state, self.run.as_mut()) {
            (WizardState::Running, Some(run)) => run.push_step(step),
            _ => StepOutcome::Ignored(IgnoreReason::AlreadyTerminal),
        };

        match outcome {
            StepOutcome::Completed => {
                self.state = WizardState::Completed;
                tracing::info!(
                    run_key = self.run_key.as_deref().unwrap_or_default(),
                    seq,
                    "Run completed"
                );
                self.persist().await;
            }
            StepOutcome::Failed => {
                self.state = WizardState::Failed;
                tracing::warn!(
                    run_key = self.run_key.as_deref().unwrap_or_default(),
                    seq,
                    message = self.run.as_ref().and_then(|r| r.error_message()).unwrap_or_default(),
                    "Run failed"
                );
                self.persist().await;
            }
            StepOutcome::Ignored(reason) => {
                tracing::debug!(seq, ?reason, state = %self.state, "Step ignored");
            }
            StepOutcome::Recorded => {}
        }

        outcome
    }

    /// Fails a running run whose step stream ended without a terminal step
    pub async fn close_stream(&mut self) -> StepOutcome {
        let next_seq = match (&self.state, &self.run) {
            (WizardState::Running, Some(run)) => run.last_seq().unwrap_or(0) + 1,
            _ => return StepOutcome::Ignored(IgnoreReason::AlreadyTerminal),
        };
        let step =
            RunStep::new(next_seq, "stream", StepStatus::Error).with_message(STREAM_CLOSED_MESSAGE);
        self.apply_step(step).await
    }

    /// Consumes `steps` until the run reaches a terminal status
    pub async fn run_to_completion(&mut self, mut steps: StepStream) -> Result<RunStatus> {
        while let Some(step) = steps.recv().await {
            if self.apply_step(step).await.is_terminal() {
                break;
            }
        }
        if self.state == WizardState::Running {
            self.close_stream().await;
        }
        self.outcome()
    }

    /// Final status of the current run, with the failing step's message as error
    pub fn outcome(&self) -> Result<RunStatus> {
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| AppError::invalid_transition("no run has been submitted"))?;
        match run.status {
            RunStatus::Error => Err(AppError::Execution(
                run.error_message().unwrap_or("run failed").to_string(),
            )),
            status => Ok(status),
        }
    }

    async fn persist(&self) {
        if let (Some(run_key), Some(run)) = (&self.run_key, &self.run) {
            self.store.append(SavedRun::new(run_key.clone(), run.clone())).await;
        }
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            state: self.state,
            data: self.data.clone(),
            pending_fields: self.pending_fields().errors().to_vec(),
            payload: self.payload.clone(),
            run_key: self.run_key.clone(),
            run: self.run.clone(),
            can_proceed: self.limiter.can_proceed(),
            remaining_wait_ms: self.limiter.remaining_wait_time().as_millis() as u64,
        }
    }
}
