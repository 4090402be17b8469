// Library exports for testing and embedding
//
// # Mutex Usage Policy
//
//   - `parking_lot::Mutex` / `RwLock` — all sync state: the context registry,
//                               per-owner contexts, the shell line queues and
//                               the debug log file.
//
//   - `tokio`                 — only drives the CLI tick loop; no engine state
//                               is shared with async tasks.
//
// A printer callback runs while its owner's context is locked. It must not
// call back into the engine for the same owner.

/// Application version (root crate version, for use by sub-crates).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod command;
pub mod debug;
pub mod engine;
pub mod filter;
pub mod output;
pub mod owner;

pub use command::{Command, load_script, parse_script};
pub use engine::{Engine, EngineBuilder, EngineError, ExecutionState};
pub use filter::{
    ChainPoll, ChainRun, ControlRequest, Filter, FilterChain, FilterTask, FnCommand, FnFilter,
    Immediate, NamedCommand, NamedCommandDispatch, StepContext, VariableSubstitution,
};
pub use output::{OutputLog, Printer};
pub use owner::OwnerKey;

// Sub-crate re-exports
pub use par_autorun_config as config;
pub use par_autorun_shell as shell;
pub use par_autorun_triggers as triggers;
