use parking_lot::Mutex;
/// Debug log bridge for par-autorun
///
/// Routes every `log::info!()` / `log::debug!()` etc. to a file:
/// /tmp/par_autorun_debug.log on Unix/macOS, %TEMP%\par_autorun_debug.log
/// on Windows. Command output owns stdout, so diagnostics stay out of it.
///
/// Level precedence: `--log-level` > `RUST_LOG` > config `log_level`.
/// When RUST_LOG is set, records are mirrored to stderr as well.
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

struct LogBridge {
    /// Opened on the first record so an `Off` session creates no file
    file: Mutex<Option<File>>,
    mirror_stderr: bool,
}

impl LogBridge {
    fn open(&self) -> Option<File> {
        let path = log_path();
        match OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(&path)
        {
            Ok(mut file) => {
                let _ = write!(
                    file,
                    "\n{}\npar-autorun debug session started at {} (level={})\n{}\n",
                    "=".repeat(80),
                    get_timestamp(),
                    log::max_level(),
                    "=".repeat(80)
                );
                Some(file)
            }
            // Nowhere to report it; keep running without a log file
            Err(_) => None,
        }
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            get_timestamp(),
            record.level(),
            record.target(),
            record.args()
        );

        let mut file = self.file.lock();
        if file.is_none() {
            *file = self.open();
        }
        if let Some(file) = file.as_mut() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }
        if self.mirror_stderr {
            eprint!("{line}");
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

static BRIDGE: OnceLock<LogBridge> = OnceLock::new();

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Path of the debug log file.
pub fn log_path() -> PathBuf {
    #[cfg(unix)]
    {
        PathBuf::from("/tmp/par_autorun_debug.log")
    }
    #[cfg(not(unix))]
    {
        std::env::temp_dir().join("par_autorun_debug.log")
    }
}

/// Level requested through `RUST_LOG`, if it names a plain level.
fn rust_log_level() -> Option<LevelFilter> {
    let value = std::env::var("RUST_LOG").ok()?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    // Directives like `par_autorun=debug` use the level after the last `=`
    let level = value.rsplit('=').next().unwrap_or(value);
    Some(level.parse().unwrap_or(LevelFilter::Info))
}

/// Install the bridge as the global logger.
///
/// `cli_level` wins over `RUST_LOG`; with neither, logging stays off until
/// [`apply_config_level`] is called. Returns the effective level. Calling
/// it again only updates the level.
pub fn init_log_bridge(cli_level: Option<LevelFilter>) -> LevelFilter {
    let env_level = rust_log_level();
    let level = cli_level.or(env_level).unwrap_or(LevelFilter::Off);

    let bridge = BRIDGE.get_or_init(|| LogBridge {
        file: Mutex::new(None),
        mirror_stderr: env_level.is_some(),
    });
    // Fails only when another logger is already installed (tests)
    let _ = log::set_logger(bridge);
    log::set_max_level(level);
    level
}

/// Apply the config file's level unless the CLI or `RUST_LOG` chose one.
pub fn apply_config_level(cli_level: Option<LevelFilter>, config_level: LevelFilter) {
    if cli_level.is_none() && rust_log_level().is_none() {
        log::set_max_level(config_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let ts = get_timestamp();
        let (secs, micros) = ts.split_once('.').unwrap();
        assert!(secs.parse::<u64>().is_ok());
        assert_eq!(micros.len(), 6);
    }

    #[test]
    fn test_log_path_file_name() {
        assert_eq!(
            log_path().file_name().and_then(|n| n.to_str()),
            Some("par_autorun_debug.log")
        );
    }
}
