//! Common error types for DQPilot

use thiserror::Error;

/// Common result type for DQPilot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across DQPilot crates
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure (connection refused, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP response from the pipeline backend
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a retry may succeed without any change on our side.
    ///
    /// Only transport-level failures qualify; API errors are authoritative.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}
