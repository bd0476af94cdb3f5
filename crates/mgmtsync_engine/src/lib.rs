//! # mgmtsync Engine
//!
//! Idempotent reconciliation of configuration payloads against a management
//! REST API.
//!
//! This crate provides:
//! - A static table of resource kinds and how each is identified and updated
//! - Identity resolution over listing snapshots
//! - Create-or-update with delete-and-recreate for kinds that refuse updates
//! - Bulk enable, disable and delete
//! - A blocking wait for a group's task server to go idle
//!
//! ## Architecture
//!
//! Every save follows the same path:
//! 1. Fetch the collection listing
//! 2. Resolve the payload to an existing identity, or to none
//! 3. Create, update, or delete and recreate
//! 4. Apply the disabling fixup when the create ignored a disabled flag
//!
//! ## Key Invariants
//!
//! - Applying the same payload twice leaves one resource
//! - Resolution never guesses between several equally good matches
//! - Security kinds always use the elevated identity
//! - Bulk operations stop at the first failure

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod certificates;
mod error;
mod kind;
mod listing;
mod manager;
mod receipt;
mod resolve;
mod wait;

pub use certificates::{CertificateAuthorities, CERTIFICATE_AUTHORITIES_PATH};
pub use error::{ReconcileError, ReconcileResult};
pub use kind::{
    append_param, DisableFixup, IdentitySource, KindSpec, ResourceKind, ResourcePaths,
    SecondaryKey, UpdateStrategy, DEFAULT_GROUP,
};
pub use listing::ListingAccessor;
pub use manager::{ReconcileState, ReconcileStats, ResourceManager};
pub use receipt::{DeleteOutcome, SaveAction, SaveReceipt, WaitOutcome};
pub use resolve::{disambiguate, resolve_identity, secondary_predicate, Resolution};
pub use wait::{wait_for_group_completion, Sleeper, ThreadSleeper, REQUESTS_PATH, TASK_SERVERS_PATH};
