//! CLI module containing argument parsing and configuration loading

pub mod args;
pub mod config;
pub mod validation;

pub use args::Args;
pub use config::{AppConfig, ConfigError, LogSettings};
pub use validation::StepSpec;
