//! Error types for smoketrace

use std::time::Duration;

use thiserror::Error;

/// Result type alias using smoketrace's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for smoketrace operations
#[derive(Error, Debug)]
pub enum Error {
    /// The accumulated payload is not a well-formed array of export requests
    #[error("Decode error: {0}")]
    Decode(String),

    /// The backend did not acknowledge a clear request
    #[error("Backend reset failed: {0}")]
    Reset(String),

    /// A readiness wait ran out of time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// A component owned by the test environment failed to stop
    #[error("Component {name} failed: {reason}")]
    Component {
        /// Component name
        name: String,
        /// Failure description
        reason: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a reset error
    pub fn reset(msg: impl Into<String>) -> Self {
        Self::Reset(msg.into())
    }

    /// Create a component error
    pub fn component(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Component {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error means the backend store may still hold data
    /// from a previous test case
    pub fn is_reset_failure(&self) -> bool {
        matches!(self, Self::Reset(_))
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
