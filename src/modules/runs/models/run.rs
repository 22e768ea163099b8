use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status reported by a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Success,
    Error,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Running => write!(f, "running"),
            StepStatus::Success => write!(f, "success"),
            StepStatus::Error => write!(f, "error"),
        }
    }
}

/// One event in a run timeline, as reported by the automation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStep {
    /// Order key, strictly increasing within a run
    pub seq: u64,
    /// Defaults to arrival time when the engine omits it
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Set on the step that concludes the run successfully
    #[serde(rename = "final", default)]
    pub is_final: bool,
}

impl RunStep {
    pub fn new(seq: u64, name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            seq,
            time: Utc::now(),
            name: name.into(),
            status,
            message: None,
            request: None,
            response: None,
            is_final: false,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    /// Marks this step as the run's terminal success
    pub fn finishing(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Whether this step ends the run
    pub fn is_terminal(&self) -> bool {
        match self.status {
            StepStatus::Error => true,
            StepStatus::Success => self.is_final,
            StepStatus::Running => false,
        }
    }
}

/// Aggregate status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

/// Where the run was launched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_url: Option<String>,
}

/// Why a step was not recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The run already reached a terminal status
    AlreadyTerminal,
    /// `seq` was not greater than the last recorded step
    OutOfOrder,
}

/// Effect of feeding one step into a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Recorded,
    Completed,
    Failed,
    Ignored(IgnoreReason),
}

impl StepOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepOutcome::Completed | StepOutcome::Failed)
    }
}

/// One execution of the selected scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    /// Set once, on the transition into `completed` or `error`
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<RunStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RunContext>,
}

impl RunData {
    /// A fresh run in `running` status
    pub fn start(context: Option<RunContext>) -> Self {
        Self {
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            steps: Vec::new(),
            result: None,
            context,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.steps.last().map(|s| s.seq)
    }

    /// Time since the run started, or its total duration once finished
    pub fn elapsed(&self) -> chrono::Duration {
        self.end_time.unwrap_or_else(Utc::now) - self.start_time
    }

    /// Appends `step` and resolves the terminal transition it implies
    pub fn push_step(&mut self, step: RunStep) -> StepOutcome {
        if !self.is_running() {
            return StepOutcome::Ignored(IgnoreReason::AlreadyTerminal);
        }

        if self.last_seq().is_some_and(|last| step.seq <= last) {
            return StepOutcome::Ignored(IgnoreReason::OutOfOrder);
        }

        let terminal = step.is_terminal();
        let status = step.status;
        let response = step.response.clone();
        self.steps.push(step);

        if !terminal {
            return StepOutcome::Recorded;
        }

        match status {
            StepStatus::Error => {
                self.finish(RunStatus::Error);
                StepOutcome::Failed
            }
            _ => {
                self.result = response;
                self.finish(RunStatus::Completed);
                StepOutcome::Completed
            }
        }
    }

    /// Moves a running run into a terminal status; later calls are no-ops
    pub fn finish(&mut self, status: RunStatus) {
        if !self.is_running() || status == RunStatus::Running {
            return;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
    }

    /// Message of the step that failed the run, if any
    pub fn error_message(&self) -> Option<&str> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.status == StepStatus::Error)
            .and_then(|s| s.message.as_deref())
    }
}

/// A persisted snapshot of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRun {
    pub run_key: String,
    pub saved_at: DateTime<Utc>,
    #[serde(flatten)]
    pub run: RunData,
}

impl SavedRun {
    pub fn new(run_key: impl Into<String>, run: RunData) -> Self {
        Self {
            run_key: run_key.into(),
            saved_at: Utc::now(),
            run,
        }
    }
}
