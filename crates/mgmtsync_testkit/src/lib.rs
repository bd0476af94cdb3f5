//! # mgmtsync Testkit
//!
//! Test utilities for mgmtsync.
//!
//! This crate provides:
//! - An in-memory management server that records every request
//! - Shared configurations and payload fixtures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mgmtsync_testkit::prelude::*;
//!
//! #[test]
//! fn creates_user() {
//!     let server = FakeManageServer::new();
//!     let client = server.client(elevated_config());
//!     // ... reconcile through `client`
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fake;
pub mod fixtures;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fake::*;
    pub use crate::fixtures::*;
}

pub use fake::*;
pub use fixtures::*;
