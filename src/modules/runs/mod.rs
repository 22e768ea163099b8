pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{RunData, RunStatus, RunStep, SavedRun, StepStatus};
pub use repositories::RunSessionStore;
pub use services::{ScenarioExecutor, SubmissionRateLimiter};
