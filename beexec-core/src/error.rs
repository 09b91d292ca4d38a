/*!
Error types for the beexec replay engine.
*/

use thiserror::Error;

/// Result type used throughout the beexec core.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Errors that can occur while configuring, persisting or replaying a command log.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Invalid strategy selector or malformed configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command could not be encoded for persistence
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A log artifact could not be decoded
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// JSON configuration parse errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `run` was called before a trace was loaded
    #[error("empty command log, load it first")]
    NotLoaded,

    /// The executor was already shut down
    #[error("executor is already shut down")]
    Closed,

    /// The throughput sampler thread failed
    #[error("Throughput sampler error: {0}")]
    Sampler(String),
}

impl ReplayError {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a new invalid format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a new sampler error
    pub fn sampler<S: Into<String>>(msg: S) -> Self {
        Self::Sampler(msg.into())
    }
}
