//! # mgmtsync Payload
//!
//! Payload introspection for mgmtsync.
//!
//! This crate provides:
//! - Field extraction from JSON and XML payloads (required or optional)
//! - Field exclusion that preserves the order of the remaining fields
//! - Comment-tolerant JSON parsing and sanitizing
//! - Listing documents and structural predicates over their entries
//!
//! ## Usage
//!
//! ```
//! use mgmtsync_payload::{ListingDocument, Payload, Predicate};
//!
//! let payload = Payload::new(r#"{"task-path": "/a.xqy", "task-root": "/"}"#);
//! let path = payload.required_field("task-path").unwrap();
//!
//! let listing = ListingDocument::parse(
//!     "<l><list-items><list-item><idref>7</idref><task-path>/a.xqy</task-path></list-item></list-items></l>",
//! )
//! .unwrap();
//! assert_eq!(listing.matching_id_refs(&Predicate::eq("task-path", path)), ["7"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod json;
mod listing;
mod payload;
mod predicate;
mod xml;

pub use error::{PayloadError, PayloadResult};
pub use json::strip_comments;
pub use listing::{ListingDocument, ListingEntry};
pub use payload::{Payload, PayloadFormat};
pub use predicate::Predicate;
