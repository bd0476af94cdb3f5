//! Outcomes of engine operations.

use mgmtsync_payload::Payload;
use mgmtsync_transport::ManageResponse;
use std::fmt;

/// What a create-or-update call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    /// A new resource was created.
    Created,
    /// The existing resource was updated in place.
    Updated,
    /// The existing resource was deleted and created again.
    Recreated,
}

impl fmt::Display for SaveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Updated => f.write_str("updated"),
            Self::Recreated => f.write_str("recreated"),
        }
    }
}

/// Receipt for one create-or-update call.
#[derive(Debug, Clone)]
pub struct SaveReceipt {
    resource_id: Option<String>,
    payload: Payload,
    path: String,
    response: ManageResponse,
    action: SaveAction,
}

impl SaveReceipt {
    /// Creates a receipt.
    pub fn new(
        resource_id: Option<String>,
        payload: Payload,
        path: impl Into<String>,
        response: ManageResponse,
        action: SaveAction,
    ) -> Self {
        Self {
            resource_id,
            payload,
            path: path.into(),
            response,
            action,
        }
    }

    /// The resolved identity, if known.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    /// The payload that was sent.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The request path used for the save.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The server's response to the save.
    pub fn response(&self) -> &ManageResponse {
        &self.response
    }

    /// The action taken.
    pub fn action(&self) -> SaveAction {
        self.action
    }

    /// Returns true if the response carried a `Location` header.
    pub fn has_location_header(&self) -> bool {
        self.response.location_header().is_some()
    }
}

/// Result of deleting by identity or key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The resource with this identity was deleted.
    Deleted(String),
    /// No resource matched.
    NotFound,
}

/// Result of waiting for a group's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The group has no task server; nothing was polled.
    GroupUnresolved,
    /// The request count reached zero.
    Completed {
        /// Number of count requests issued. Saturates rather than wrapping.
        polls: u64,
    },
}
