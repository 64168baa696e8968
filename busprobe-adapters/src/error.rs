//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur when constructing or configuring an adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Timeout waiting for the server.
    #[error("Request timed out")]
    Timeout,

    /// Configuration could not be loaded or deserialized.
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// Feature not supported by this client or server.
    #[error("Feature not supported: {0}")]
    Unsupported(String),
}

/// Failure of an account probe against the durable-stream engine.
///
/// The `Display` text is what ends up after `Error: ` in a health snapshot,
/// so variants carrying a foreign error keep its message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The underlying connection is closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server does not have the durable-stream engine enabled.
    #[error("jetstream not enabled")]
    NotEnabled,

    /// The caller cancelled the probe.
    #[error("probe cancelled")]
    Cancelled,

    /// The caller's deadline passed before the probe finished.
    #[error("probe deadline exceeded")]
    DeadlineExceeded,

    /// Any other failure reported by the client library.
    #[error("{0}")]
    Backend(String),
}

/// Errors returned by stream management operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The named stream does not exist.
    #[error("stream not found: {0}")]
    NotFound(String),

    /// Any other failure reported by the client library.
    #[error("{0}")]
    Backend(String),
}

impl StreamError {
    /// Check if this is a [`StreamError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StreamError::NotFound(_))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for AdapterError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else {
            AdapterError::Connection(err.to_string())
        }
    }
}
