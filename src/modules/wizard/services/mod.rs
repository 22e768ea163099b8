pub mod registry;
pub mod state_machine;
pub mod validator;

pub use registry::{drive_run, SharedWizard, WizardRegistry};
pub use state_machine::{
    LaunchAttempt, PendingLaunch, ScenarioWizard, WizardSnapshot, WizardState,
    STREAM_CLOSED_MESSAGE,
};
pub use validator::build_start_payload;
