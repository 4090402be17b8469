//! Shared integration test helpers for par-autorun.
//!
//! Include this module at the top of each test file that needs it:
//!
//! ```ignore
//! mod common;
//! use common::{Recorder, run_to_end, sh_config};
//! ```
//!
//! The `#[allow(dead_code)]` attribute suppresses warnings when only a subset
//! of helpers are used per file.

#![allow(dead_code)]

use par_autorun::config::Config;
use par_autorun::{Engine, Filter, FilterTask, Immediate, OwnerKey, StepContext};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Generous upper bound for anything involving a real subprocess.
pub const PROCESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Default config with `/bin/sh` as the shell.
pub fn sh_config() -> Config {
    let mut config = Config::default();
    config.shell.executable = "/bin/sh".to_string();
    config
}

/// Default config whose "shell" is `cat`, so forwarded text comes back verbatim.
pub fn cat_config() -> Config {
    let mut config = Config::default();
    config.shell.executable = "cat".to_string();
    config
}

/// Step `owner` until the queue ends (`Ok(false)`), sleeping briefly between
/// steps. Panics on engine errors or when `timeout` elapses.
pub fn run_to_end(engine: &Engine, owner: &OwnerKey, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while engine.step(owner).expect("step failed") {
        assert!(
            Instant::now() < deadline,
            "owner '{owner}' did not finish within {timeout:?}"
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Poll `owner`'s output until it contains `needle`.
pub fn wait_for_output(engine: &Engine, owner: &OwnerKey, needle: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        engine.poll_output(owner).expect("poll_output failed");
        if engine.output_text(owner).contains(needle) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Keep polling `owner`'s output for `duration` (for negative assertions).
pub fn settle(engine: &Engine, owner: &OwnerKey, duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        engine.poll_output(owner).expect("poll_output failed");
        std::thread::sleep(Duration::from_millis(10));
    }
    engine.poll_output(owner).expect("poll_output failed");
}

/// Filter recording every command it sees.
///
/// Consuming recorders stand in for the shell: whatever reaches them would
/// have been forwarded.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
    consume: bool,
}

impl Recorder {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn consuming() -> Self {
        Self {
            consume: true,
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl Filter for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn start(&self, cx: &mut StepContext<'_>, command: &str) -> Box<dyn FilterTask> {
        self.seen.lock().push(format!("{}:{}", cx.owner(), command));
        if self.consume {
            Immediate::consume()
        } else {
            Immediate::pass(command)
        }
    }
}
