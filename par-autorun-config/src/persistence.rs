//! Config persistence and path resolution for `Config`.
//!
//! Covers:
//! - `load_from` / `save_to` for explicit paths (atomic write)
//! - `config_dir` / `config_path` helpers for the default location

use super::config::Config;
use super::env_vars;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Load and validate configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration text, applying `${VAR}` substitution first.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let allow_all = env_vars::pre_scan_allow_all_env_vars(contents);
        let contents = env_vars::substitute_variables_with_allowlist(contents, allow_all);
        let config: Config = serde_yaml_ng::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml_ng::to_string(self)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Directory holding the config file (`~/.config/par-autorun`).
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("par-autorun")
            } else {
                PathBuf::from(".")
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("par-autorun")
            } else {
                PathBuf::from(".")
            }
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.shell.executable = "bash".to_string();
        config.triggers.censor_line.push("secret".to_string());
        config.save_to(&path).unwrap();

        assert!(!path.with_extension("yaml.tmp").exists());
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_default_path_is_under_par_autorun_dir() {
        let path = Config::config_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("config.yaml"));
        assert_eq!(path.parent(), Some(Config::config_dir().as_path()));
        assert!(Config::config_dir().ends_with("par-autorun"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_from(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = Config::from_yaml("shell: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_runs_on_load() {
        let err = Config::from_yaml("engine:\n  tick_interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_default_value_substitution_applies_before_parse() {
        let config =
            Config::from_yaml("shell:\n  executable: ${PAR_AUTORUN_TEST_UNSET_SHELL:-zsh}\n")
                .unwrap();
        assert_eq!(config.shell.executable, "zsh");
    }
}
