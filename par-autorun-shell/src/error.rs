//! Errors raised while spawning or talking to a shell process.

/// Failure modes of [`crate::ShellProcess`].
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// The executable could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A piped stdio handle was not available after spawning.
    #[error("failed to capture {0} of the shell process")]
    MissingPipe(&'static str),

    /// A background reader thread could not be started.
    #[error("failed to start reader thread: {0}")]
    Reader(#[source] std::io::Error),

    /// The process has exited, was stopped, or its owner let it go.
    #[error("shell process is not running")]
    NotRunning,

    /// Writing a command to stdin failed.
    #[error("failed to write to shell stdin: {0}")]
    Write(#[from] std::io::Error),
}
