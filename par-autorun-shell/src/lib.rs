//! Shell subprocess management for par-autorun.
//!
//! [`ShellProcess`] owns one child process per automation owner. Commands are
//! written to its stdin; stdout and stderr are read on background threads,
//! split into lines, scanned for captured variables and queued for the
//! cooperative side to drain.

pub mod error;
pub mod process;

pub use error::ShellError;
pub use process::{KeepAlive, LineCallback, ShellLaunch, ShellProcess};
