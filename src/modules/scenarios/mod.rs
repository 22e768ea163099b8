pub mod models;

pub use models::{Scenario, ScenarioSelection};
