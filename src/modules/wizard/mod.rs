pub mod controllers;
pub mod models;
pub mod services;

pub use models::{DraftUpdate, StartPayload, WizardData};
pub use services::{ScenarioWizard, WizardRegistry, WizardState};
