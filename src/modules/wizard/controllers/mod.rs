pub mod wizard_controller;

pub use wizard_controller::configure;
