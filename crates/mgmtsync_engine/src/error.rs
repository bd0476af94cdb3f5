//! Error types for the reconciliation engine.

use mgmtsync_payload::PayloadError;
use mgmtsync_transport::{HttpMethod, ManageResponse, TransportError};
use thiserror::Error;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that can occur while reconciling resources.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A request could not be completed at the network level.
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    /// A required identity or key field is missing, or the payload is unreadable.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] PayloadError),

    /// Several existing resources match and nothing tells them apart.
    #[error("ambiguous {kind} match for {key}; candidates: {candidates:?}")]
    AmbiguousResourceMatch {
        /// Resource kind.
        kind: &'static str,
        /// Description of the key that matched.
        key: String,
        /// Identities of the matching resources.
        candidates: Vec<String>,
    },

    /// A group name could not be mapped to a task server.
    #[error("could not find task server for group '{group}'")]
    UnresolvableGroupReference {
        /// Group name.
        group: String,
    },

    /// The server rejected a request.
    #[error("{method} {path} failed with status {status}: {body}")]
    RemoteOperationFailed {
        /// Request method.
        method: HttpMethod,
        /// Request path.
        path: String,
        /// Response status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// A create response carried no `Location` header.
    #[error("create at {path} returned no Location header")]
    MissingLocationHeader {
        /// Request path of the create.
        path: String,
    },

    /// The resource kind does not support the operation.
    #[error("{operation} is not supported for {kind}")]
    UnsupportedOperation {
        /// Resource kind.
        kind: &'static str,
        /// Operation name.
        operation: &'static str,
    },

    /// A listing or properties document could not be read.
    #[error("invalid listing: {0}")]
    InvalidListing(String),
}

impl From<TransportError> for ReconcileError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Payload(payload) => Self::MalformedPayload(payload),
            other => Self::Transport(other),
        }
    }
}

impl ReconcileError {
    /// Returns false only for errors the caller may treat as a no-op.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnresolvableGroupReference { .. })
    }

    /// Returns the HTTP status for server rejections.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RemoteOperationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Turns a non-success response into [`ReconcileError::RemoteOperationFailed`].
pub(crate) fn ensure_success(
    method: HttpMethod,
    path: &str,
    response: ManageResponse,
) -> ReconcileResult<ManageResponse> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ReconcileError::RemoteOperationFailed {
        method,
        path: path.to_string(),
        status: response.status_code(),
        body: response.body().to_string(),
    })
}
