//! Error types for the payload crate.

use thiserror::Error;

/// Result type for payload operations.
pub type PayloadResult<T> = Result<T, PayloadError>;

/// Number of payload characters quoted in error messages.
const EXCERPT_CHARS: usize = 200;

/// Errors that can occur while inspecting or rewriting a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// A required field is missing from the payload.
    #[error("payload is missing required field '{field}'; payload: {excerpt}")]
    MissingField {
        /// Name of the missing field.
        field: String,
        /// Leading part of the payload, for diagnostics.
        excerpt: String,
    },

    /// The payload could not be parsed or written as JSON.
    #[error("invalid JSON payload: {message}")]
    Json {
        /// Description of the JSON error.
        message: String,
    },

    /// The payload could not be parsed or written as XML.
    #[error("invalid XML payload: {message}")]
    Xml {
        /// Description of the XML error.
        message: String,
    },
}

impl PayloadError {
    /// Creates a missing field error quoting the start of `payload`.
    pub fn missing_field(field: impl Into<String>, payload: &str) -> Self {
        Self::MissingField {
            field: field.into(),
            excerpt: excerpt(payload),
        }
    }

    /// Creates a JSON error.
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json {
            message: message.into(),
        }
    }

    /// Creates an XML error.
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml {
            message: message.into(),
        }
    }
}

fn excerpt(payload: &str) -> String {
    let trimmed = payload.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    out.push_str("...");
    out
}
