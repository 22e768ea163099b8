//! PayLab payment scenario test harness
//!
//! Operators pick payment scenarios in a step-by-step wizard, the run is
//! launched on an external automation engine behind a submission rate
//! limiter, step updates are tracked to a terminal status, and the most
//! recent runs are kept in a bounded history.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use modules::runs;
pub use modules::scenarios;
pub use modules::wizard;
