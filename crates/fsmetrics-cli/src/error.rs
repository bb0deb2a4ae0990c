//! CLI error types.

use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Registry error, including invalid configuration.
    #[error(transparent)]
    Metrics(#[from] fsmetrics_core::Error),

    /// Invalid command-line arguments.
    #[error("invalid arguments: {0}")]
    Args(String),

    /// A workload thread panicked.
    #[error("workload thread {0} panicked")]
    WorkerPanicked(usize),
}

/// Result alias for the CLI.
pub type Result<T> = std::result::Result<T, CliError>;
