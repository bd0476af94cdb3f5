//! Certificate authorities.
//!
//! Authorities are created from raw PEM text rather than a properties
//! payload, and always require the elevated identity.

use crate::error::{ensure_success, ReconcileResult};
use crate::listing::ListingAccessor;
use mgmtsync_transport::{HttpMethod, ManageClient, ManageResponse};
use tracing::info;

/// Collection path for certificate authorities.
pub const CERTIFICATE_AUTHORITIES_PATH: &str = "/manage/v2/certificate-authorities";

/// Manages trusted certificate authorities.
pub struct CertificateAuthorities<'a> {
    client: &'a ManageClient,
}

impl<'a> CertificateAuthorities<'a> {
    /// Creates a manager.
    pub fn new(client: &'a ManageClient) -> Self {
        Self { client }
    }

    /// Adds a certificate authority from PEM text.
    pub fn create(&self, pem: &str) -> ReconcileResult<ManageResponse> {
        info!("Creating certificate authority");
        let response = self
            .client
            .post_text(CERTIFICATE_AUTHORITIES_PATH, pem, true)?;
        ensure_success(HttpMethod::Post, CERTIFICATE_AUTHORITIES_PATH, response)
    }

    /// Returns the identities of all certificate authorities.
    pub fn list_identities(&self) -> ReconcileResult<Vec<String>> {
        ListingAccessor::new(self.client, true).list_identities(CERTIFICATE_AUTHORITIES_PATH)
    }

    /// Deletes a certificate authority by identity or name.
    pub fn delete(&self, id: &str) -> ReconcileResult<()> {
        let path = format!("{CERTIFICATE_AUTHORITIES_PATH}/{id}");
        info!("Deleting certificate authority: {}", id);
        let response = self.client.delete(&path, true)?;
        ensure_success(HttpMethod::Delete, &path, response)?;
        Ok(())
    }
}
