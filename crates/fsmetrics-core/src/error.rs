//! Core error types.

use thiserror::Error;

/// Metrics registry errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid bucket boundaries, names or label schema.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Wrong number of extra label values for the registry's schema.
    #[error("label mismatch: expected {expected} extra label values, got {actual}")]
    LabelMismatch {
        /// Number of extra labels declared by the schema.
        expected: usize,
        /// Number of extra label values supplied by the caller.
        actual: usize,
    },

    /// Operation name was empty.
    #[error("operation name must not be empty")]
    EmptyOperation,

    /// Observed value was negative or not finite.
    #[error("invalid observation value: {0}")]
    InvalidValue(f64),

    /// Recording or reading before `initialize`.
    #[error("metrics registry is not initialized")]
    NotInitialized,

    /// A metric family with the same name already exists.
    #[error("metric family already registered: {0}")]
    DuplicateRegistration(String),

    /// IO error while loading configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration or encoding a snapshot.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;
