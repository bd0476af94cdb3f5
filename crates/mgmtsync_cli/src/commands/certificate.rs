//! Certificate authority command.

use crate::error::{CliError, CliResult};
use mgmtsync_engine::CertificateAuthorities;
use mgmtsync_transport::ManageClient;
use std::fs;
use std::path::Path;

/// Adds the certificate authority in the PEM file at `path`.
pub fn create(client: &ManageClient, path: &Path) -> CliResult<Option<String>> {
    let pem = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
    let response = CertificateAuthorities::new(client).create(&pem)?;
    let id = response.location_id().map(str::to_string);
    match &id {
        Some(id) => println!("✓ Certificate authority created: {id}"),
        None => println!("✓ Certificate authority created"),
    }
    Ok(id)
}
