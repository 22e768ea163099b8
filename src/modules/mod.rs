pub mod health;
pub mod runs;
pub mod scenarios;
pub mod wizard;
