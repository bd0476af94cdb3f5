//! Error types for the transport.

use mgmtsync_payload::PayloadError;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised before a response could be obtained from the server.
///
/// A response with a non-success status is not an error at this layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connecting, sending, or reading the response failed.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
    },

    /// The request URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// The server sent an authentication challenge that cannot be answered.
    #[error("unsupported authentication challenge: {0}")]
    InvalidChallenge(String),

    /// The payload could not be prepared for sending.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
}

impl TransportError {
    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}
