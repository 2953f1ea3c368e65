//! Xargs channel error types.

/// Error type for launching a process.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The executable was not found.
    #[error("Command not found: {command}")]
    NotFound { command: String },
    /// Permission denied when spawning.
    #[error("Permission denied: {command}")]
    PermissionDenied { command: String },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    pub(crate) fn from_io(command: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                command: command.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                command: command.to_string(),
            },
            _ => Self::Io(err),
        }
    }
}

/// Errors surfaced by an [`XargsChannel`](crate::xargs::XargsChannel).
#[derive(thiserror::Error, Debug)]
pub enum XargsError {
    /// The command line could not be tokenized.
    #[error("Failed to parse command line: {0}")]
    Tokenize(#[from] shell_words::ParseError),

    /// The process could not be started.
    #[error("Failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),

    /// Waiting on the process failed.
    #[error("Failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),

    /// Forwarding process output to the downstream target failed.
    #[error("Failed to forward output: {0}")]
    Output(#[source] std::io::Error),

    /// An item was written after the writer signaled completion.
    #[error("Write after end")]
    WriteAfterEnd,

    /// The downstream target came back as a different type than was piped.
    #[error("Downstream target type mismatch")]
    TargetMismatch,

    /// The channel driver is gone.
    #[error("Xargs channel closed")]
    Closed,
}
