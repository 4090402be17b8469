//! Default value functions for configuration.
//!
//! Used as `#[serde(default = "crate::defaults::...")]` attributes on
//! config fields so that partial YAML files fill in the same values as
//! `Default::default()`.

// ── Primitive helpers ──────────────────────────────────────────────────────

pub fn bool_true() -> bool {
    true
}

// ── Shell ──────────────────────────────────────────────────────────────────

pub fn shell_executable() -> String {
    #[cfg(windows)]
    {
        "cmd.exe".to_string()
    }
    #[cfg(not(windows))]
    {
        "/bin/sh".to_string()
    }
}

pub fn ready_timeout_ms() -> u64 {
    10_000
}

// ── Engine ─────────────────────────────────────────────────────────────────

/// Transitions one `step` may make before the engine declares a runaway loop.
pub fn max_iterations_per_step() -> usize {
    10_000
}

pub fn max_output_lines() -> usize {
    5_000
}

pub fn tick_interval_ms() -> u64 {
    16
}
