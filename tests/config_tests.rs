//! Configuration files and command scripts on disk.

use par_autorun::config::{Config, ConfigError, LogLevel};
use par_autorun::triggers::ReadLogic;
use par_autorun::{Command, load_script};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_full_config_file_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        r#"
shell:
  executable: bash
  args: ["--norc", "--noprofile"]
  working_directory: /tmp
  env_vars:
    MODE: test
  ready_pattern: '\$ $'
  ready_timeout_ms: 2500
triggers:
  censor_line: ["password"]
  disable_output: ["^BEGIN"]
  enable_output: ["^END"]
  variables:
    - name: build
      pattern: 'build #(\d+)'
      groups: [1]
      read_logic: ignore_after_first_match
engine:
  max_iterations_per_step: 500
  tick_interval_ms: 5
log_level: debug
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.shell.executable, "bash");
    assert_eq!(config.shell.args, vec!["--norc", "--noprofile"]);
    assert_eq!(config.shell.env_vars.get("MODE").map(String::as_str), Some("test"));
    assert_eq!(config.shell.ready_pattern.as_deref(), Some(r"\$ $"));
    assert_eq!(config.shell.ready_timeout_ms, 2500);
    assert_eq!(config.triggers.censor_line, vec!["password"]);
    assert_eq!(
        config.triggers.variables[0].read_logic,
        ReadLogic::IgnoreAfterFirstMatch
    );
    assert_eq!(config.engine.max_iterations_per_step, 500);
    assert_eq!(config.engine.max_output_lines, 5000);
    assert_eq!(config.log_level, LogLevel::Debug);
}

#[test]
fn test_allowlisted_env_var_substituted_in_config() {
    // SAFETY: the variable name is unique to this test
    unsafe { std::env::set_var("PAR_AUTORUN_TEST_CFG_SHELL", "zsh") };
    let config = Config::from_yaml("shell:\n  executable: ${PAR_AUTORUN_TEST_CFG_SHELL}\n").unwrap();
    assert_eq!(config.shell.executable, "zsh");
    unsafe { std::env::remove_var("PAR_AUTORUN_TEST_CFG_SHELL") };
}

#[test]
fn test_non_allowlisted_env_var_needs_opt_in() {
    // SAFETY: the variable name is unique to this test
    unsafe { std::env::set_var("SECRET_SHELL_FOR_PAR_AUTORUN_TEST", "fish") };

    let yaml = "shell:\n  executable: ${SECRET_SHELL_FOR_PAR_AUTORUN_TEST}\n";
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.shell.executable, "${SECRET_SHELL_FOR_PAR_AUTORUN_TEST}");

    let opted_in = format!("allow_all_env_vars: true\n{yaml}");
    let config = Config::from_yaml(&opted_in).unwrap();
    assert_eq!(config.shell.executable, "fish");

    unsafe { std::env::remove_var("SECRET_SHELL_FOR_PAR_AUTORUN_TEST") };
}

#[test]
fn test_empty_executable_rejected() {
    let err = Config::from_yaml("shell:\n  executable: ''\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_text_script_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deploy.txt");
    fs::write(&path, "# prepare\necho start\n\nsleep 0.1\n  # indented note\nquit\n").unwrap();

    let commands = load_script(&path).unwrap();
    assert_eq!(
        commands,
        vec![
            Command::ignored("prepare"),
            Command::new("echo start"),
            Command::new("sleep 0.1"),
            Command::ignored("indented note"),
            Command::new("quit"),
        ]
    );
}

#[test]
fn test_yaml_script_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("steps.yml");
    fs::write(
        &path,
        "- echo one\n- text: echo skipped\n  ignore: true\n- log done\n",
    )
    .unwrap();

    let commands = load_script(&path).unwrap();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[1], Command::ignored("echo skipped"));
    assert_eq!(commands[2].first_token(), Some("log"));
}

#[test]
fn test_missing_script_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.txt");
    let err = load_script(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.txt"));
}

#[test]
fn test_invalid_yaml_script_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "- [unterminated\n").unwrap();
    assert!(load_script(&path).is_err());
}
