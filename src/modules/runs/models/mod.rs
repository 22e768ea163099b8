pub mod run;

pub use run::{
    IgnoreReason, RunContext, RunData, RunStatus, RunStep, SavedRun, StepOutcome, StepStatus,
};
