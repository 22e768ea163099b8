pub mod scenario;

pub use scenario::{Scenario, ScenarioSelection};
