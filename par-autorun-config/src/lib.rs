//! Configuration system for the par-autorun command pipeline.
//!
//! This crate provides configuration loading, saving, and default values
//! for the pipeline engine. It includes:
//!
//! - Shell launch settings (executable, arguments, working directory, readiness)
//! - Output trigger patterns (censorship rows and variable captures)
//! - Engine limits (iteration guard, output buffer size, tick interval)
//! - `${VAR}` environment substitution applied before parsing

pub mod config;
pub mod defaults;
pub mod env_vars;
pub mod error;
mod persistence;
pub mod types;

pub use config::{Config, EngineConfig, ShellConfig, TriggerSetConfig, VariableCaptureConfig};
pub use env_vars::{substitute_variables, substitute_variables_with_allowlist};
pub use error::ConfigError;
pub use types::LogLevel;

// Read logic is part of the variable capture schema
pub use par_autorun_triggers::ReadLogic;
