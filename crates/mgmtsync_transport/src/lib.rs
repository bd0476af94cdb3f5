//! # mgmtsync Transport
//!
//! HTTP transport for the cluster management REST API.
//!
//! This crate provides:
//! - Connection configuration with operating and elevated identities
//! - Request and response types plus the [`HttpClient`] seam
//! - Digest-authenticated channels over a blocking `reqwest` client
//! - [`ManageClient`], which routes each request to the right channel
//!
//! Non-success statuses are returned as responses. Only failures that leave
//! no response (connection, I/O, URL building) are errors.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod client;
mod config;
mod digest;
mod error;
mod http;

pub use channel::AuthenticatedChannel;
pub use client::ManageClient;
pub use config::{ManageConfig, DEFAULT_PORT};
pub use digest::{DigestAlgorithm, DigestCache, DigestChallenge};
pub use error::{TransportError, TransportResult};
pub use http::{ContentType, HttpClient, HttpMethod, ManageRequest, ManageResponse};
