//! Command-line interface for par-autorun.
//!
//! This module handles CLI argument parsing, the `init-config` subcommand and
//! turning global flags into configuration overrides for `run`.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use par_autorun_config::{Config, LogLevel};
use std::path::{Path, PathBuf};

/// par-autorun - Drive a shell through a filtered command pipeline
#[derive(Parser)]
#[command(name = "par-autorun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.config/par-autorun/config.yaml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Shell command line, e.g. "bash --norc" (overrides shell.executable/args)
    #[arg(long, global = true, value_name = "COMMAND")]
    pub shell: Option<String>,

    /// Working directory for the shell
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Debug log level: off, error, warn, info, debug, trace
    #[arg(long, global = true, value_name = "LEVEL", value_parser = parse_log_level)]
    pub log_level: Option<LevelFilter>,

    /// Milliseconds between scheduler steps
    #[arg(long, global = true, value_name = "MS")]
    pub tick_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command script (text: one command per line, or a .yaml list)
    Run {
        /// Script to run
        script: PathBuf,

        /// Owner name for the execution context
        #[arg(long, default_value = "main")]
        owner: String,

        /// Keep printing shell output until it has been quiet this long
        #[arg(long, value_name = "MS", default_value_t = 500)]
        drain_ms: u64,
    },

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_log_level(value: &str) -> Result<LevelFilter, String> {
    LogLevel::from_name(value)
        .map(LogLevel::to_level_filter)
        .ok_or_else(|| format!("unknown log level {value:?}"))
}

/// Options for the `run` subcommand
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub script: PathBuf,
    pub owner: String,
    pub drain_ms: u64,
    pub config: Option<PathBuf>,
    pub shell: Option<String>,
    pub cwd: Option<PathBuf>,
    pub log_level: Option<LevelFilter>,
    pub tick_ms: Option<u64>,
}

impl RunOptions {
    /// Load the configuration and apply the command-line overrides.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => {
                let path = Config::config_path();
                if path.exists() {
                    Config::load_from(&path)
                        .with_context(|| format!("Failed to load config {}", path.display()))?
                } else {
                    log::info!("No config at {:?}, using defaults", path);
                    Config::default()
                }
            }
        };
        self.apply_overrides(&mut config)?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut Config) -> Result<()> {
        if let Some(shell) = &self.shell {
            let mut words = shell_words::split(shell)
                .with_context(|| format!("Invalid --shell value {:?}", shell))?;
            if words.is_empty() {
                bail!("--shell must name an executable");
            }
            config.shell.executable = words.remove(0);
            config.shell.args = words;
        }
        if let Some(cwd) = &self.cwd {
            config.shell.working_directory = Some(cwd.clone());
        }
        if let Some(tick_ms) = self.tick_ms {
            config.engine.tick_interval_ms = tick_ms;
        }
        config.validate()?;
        Ok(())
    }
}

/// Result of CLI processing
pub enum CliResult {
    /// Run a script with these options
    Continue(RunOptions),
    /// Exit with the given code (subcommand completed)
    Exit(i32),
}

/// Process CLI arguments and handle subcommands
pub fn process_cli() -> CliResult {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig { force } => {
            let path = cli.config.unwrap_or_else(Config::config_path);
            match init_config(&path, force) {
                Ok(()) => CliResult::Exit(0),
                Err(e) => {
                    eprintln!("par-autorun: error: {e:#}");
                    CliResult::Exit(1)
                }
            }
        }
        Commands::Run {
            script,
            owner,
            drain_ms,
        } => CliResult::Continue(RunOptions {
            script,
            owner,
            drain_ms,
            config: cli.config,
            shell: cli.shell,
            cwd: cli.cwd,
            log_level: cli.log_level,
            tick_ms: cli.tick_ms,
        }),
    }
}

/// Write the default configuration to `path`
fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Config::default()
        .save_to(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
