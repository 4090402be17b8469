//! Core `Config` struct definition.
//!
//! The YAML file is split into four sections:
//!
//! | Section     | Struct               | Purpose                                   |
//! |-------------|----------------------|-------------------------------------------|
//! | `shell`     | [`ShellConfig`]      | how the per-owner shell process is spawned |
//! | `triggers`  | [`TriggerSetConfig`] | censorship patterns and variable captures  |
//! | `engine`    | [`EngineConfig`]     | scheduler limits                           |
//! | `log_level` | [`LogLevel`]         | debug log verbosity                        |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::types::LogLevel;
use par_autorun_triggers::ReadLogic;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub shell: ShellConfig,

    #[serde(default)]
    pub triggers: TriggerSetConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Debug log level (overridden by `RUST_LOG` and `--log-level`)
    #[serde(default)]
    pub log_level: LogLevel,

    /// Resolve every `${VAR}` in the config file, not just allowlisted ones.
    #[serde(default)]
    pub allow_all_env_vars: bool,
}

/// How the shell process behind each owner is launched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellConfig {
    /// Executable path or name looked up on `PATH`
    #[serde(default = "crate::defaults::shell_executable")]
    pub executable: String,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory (inherits the host's when unset)
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Extra environment variables on top of the inherited environment
    #[serde(default)]
    pub env_vars: HashMap<String, String>,

    /// Regex that marks the shell as ready for the next command.
    ///
    /// When set, the engine waits after each forwarded command until the
    /// most recent output line matches (or `ready_timeout_ms` elapses).
    /// An unterminated line such as an interactive `$ ` prompt is matched
    /// as soon as it is read.
    #[serde(default)]
    pub ready_pattern: Option<String>,

    /// Give up waiting for `ready_pattern` after this many milliseconds
    #[serde(default = "crate::defaults::ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            executable: crate::defaults::shell_executable(),
            args: Vec::new(),
            working_directory: None,
            env_vars: HashMap::new(),
            ready_pattern: None,
            ready_timeout_ms: crate::defaults::ready_timeout_ms(),
        }
    }
}

/// Output trigger patterns applied to every new owner context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TriggerSetConfig {
    /// Lines matching any of these are hidden
    #[serde(default)]
    pub censor_line: Vec<String>,

    /// A matching line hides itself and all following output
    #[serde(default)]
    pub disable_output: Vec<String>,

    /// A matching line hides itself and resumes output
    #[serde(default)]
    pub enable_output: Vec<String>,

    /// Variables captured from shell output
    #[serde(default)]
    pub variables: Vec<VariableCaptureConfig>,
}

/// A named value extracted from shell output by regex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableCaptureConfig {
    pub name: String,
    pub pattern: String,

    /// Capture groups to concatenate (empty = whole match)
    #[serde(default)]
    pub groups: Vec<usize>,

    #[serde(default)]
    pub read_logic: ReadLogic,

    #[serde(default = "crate::defaults::bool_true")]
    pub enabled: bool,
}

/// Scheduler limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Transitions a single `step` may make before it is treated as a runaway loop
    #[serde(default = "crate::defaults::max_iterations_per_step")]
    pub max_iterations_per_step: usize,

    /// Output lines retained per owner (oldest dropped first)
    #[serde(default = "crate::defaults::max_output_lines")]
    pub max_output_lines: usize,

    /// Interval at which the CLI driver calls `step`
    #[serde(default = "crate::defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations_per_step: crate::defaults::max_iterations_per_step(),
            max_output_lines: crate::defaults::max_output_lines(),
            tick_interval_ms: crate::defaults::tick_interval_ms(),
        }
    }
}

impl Config {
    /// Check semantic constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shell.executable.trim().is_empty() {
            return Err(ConfigError::Validation(
                "shell.executable must not be empty".to_string(),
            ));
        }
        if self.engine.max_iterations_per_step == 0 {
            return Err(ConfigError::Validation(
                "engine.max_iterations_per_step must be at least 1".to_string(),
            ));
        }
        if self.engine.tick_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "engine.tick_interval_ms must be at least 1".to_string(),
            ));
        }
        for capture in &self.triggers.variables {
            if capture.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "variable capture with pattern {:?} has no name",
                    capture.pattern
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
shell:
  executable: bash
  args: ["--norc"]
engine:
  max_output_lines: 10
"#;
        let config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.shell.executable, "bash");
        assert_eq!(config.shell.args, vec!["--norc".to_string()]);
        assert_eq!(config.shell.ready_timeout_ms, 10_000);
        assert_eq!(config.engine.max_output_lines, 10);
        assert_eq!(config.engine.max_iterations_per_step, 10_000);
        assert_eq!(config.log_level, LogLevel::Off);
    }

    #[test]
    fn test_variable_capture_defaults() {
        let yaml = r#"
triggers:
  variables:
    - name: version
      pattern: 'version (\d+)'
      groups: [1]
      read_logic: ignore_after_first_match
    - name: prompt
      pattern: '\$ $'
"#;
        let config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        let vars = &config.triggers.variables;
        assert_eq!(vars[0].read_logic, ReadLogic::IgnoreAfterFirstMatch);
        assert_eq!(vars[0].groups, vec![1]);
        assert!(vars[1].enabled);
        assert_eq!(vars[1].read_logic, ReadLogic::None);
    }

    #[test]
    fn test_validation_rejects_zero_guard() {
        let mut config = Config::default();
        config.engine.max_iterations_per_step = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_unnamed_capture() {
        let mut config = Config::default();
        config.triggers.variables.push(VariableCaptureConfig {
            name: " ".to_string(),
            pattern: "x".to_string(),
            groups: Vec::new(),
            read_logic: ReadLogic::None,
            enabled: true,
        });
        assert!(config.validate().is_err());
    }
}
