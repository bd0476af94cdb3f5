//! Access to collection listings.

use crate::error::{ensure_success, ReconcileError, ReconcileResult};
use mgmtsync_payload::{ListingDocument, Predicate};
use mgmtsync_transport::{HttpMethod, ManageClient};
use tracing::debug;

/// Reads listing documents for collections.
#[derive(Clone, Copy)]
pub struct ListingAccessor<'a> {
    client: &'a ManageClient,
    as_elevated: bool,
}

impl<'a> ListingAccessor<'a> {
    /// Creates an accessor sending requests as the operating or elevated identity.
    pub fn new(client: &'a ManageClient, as_elevated: bool) -> Self {
        Self {
            client,
            as_elevated,
        }
    }

    /// Fetches and parses the listing at `collection_path`.
    pub fn snapshot(&self, collection_path: &str) -> ReconcileResult<ListingDocument> {
        let response = self.client.get_xml(collection_path, self.as_elevated)?;
        let response = ensure_success(HttpMethod::Get, collection_path, response)?;
        ListingDocument::parse(response.body())
            .map_err(|e| ReconcileError::InvalidListing(format!("{collection_path}: {e}")))
    }

    /// Returns the identities in the listing, in order.
    pub fn list_identities(&self, collection_path: &str) -> ReconcileResult<Vec<String>> {
        Ok(self.snapshot(collection_path)?.id_refs())
    }

    /// Returns the friendly names in the listing, in order.
    pub fn list_names(&self, collection_path: &str) -> ReconcileResult<Vec<String>> {
        Ok(self.snapshot(collection_path)?.name_refs())
    }

    /// Returns the identity of every entry satisfying `predicate`.
    pub fn find_matching_identities(
        &self,
        collection_path: &str,
        predicate: &Predicate,
    ) -> ReconcileResult<Vec<String>> {
        let ids = self
            .snapshot(collection_path)?
            .matching_id_refs(predicate);
        debug!("{} entries of {} match [{}]", ids.len(), collection_path, predicate);
        Ok(ids)
    }

    /// Returns true if any entry satisfies `predicate`.
    pub fn exists(&self, collection_path: &str, predicate: &Predicate) -> ReconcileResult<bool> {
        Ok(self.snapshot(collection_path)?.any_match(predicate))
    }
}
