//! Single-resource and bulk commands for one kind.

use crate::error::CliResult;
use mgmtsync_engine::{DeleteOutcome, ResourceKind, ResourceManager};
use mgmtsync_transport::ManageClient;

/// Bulk operations over every resource of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperation {
    /// Enable every resource.
    EnableAll,
    /// Disable every resource.
    DisableAll,
    /// Delete every resource.
    DeleteAll,
}

fn manager<'a>(client: &'a ManageClient, kind: ResourceKind, group: Option<&str>) -> ResourceManager<'a> {
    let manager = ResourceManager::new(client, kind);
    match group {
        Some(group) => manager.with_group(group),
        None => manager,
    }
}

/// Deletes the resource whose identity or alias equals `key`.
pub fn delete(
    client: &ManageClient,
    kind: ResourceKind,
    group: Option<&str>,
    key: &str,
) -> CliResult<DeleteOutcome> {
    let outcome = manager(client, kind, group).delete(key)?;
    match &outcome {
        DeleteOutcome::Deleted(id) => println!("deleted {kind} {id}"),
        DeleteOutcome::NotFound => println!("no {kind} matches {key}"),
    }
    Ok(outcome)
}

/// Prints whether a resource matches `key`.
pub fn exists(
    client: &ManageClient,
    kind: ResourceKind,
    group: Option<&str>,
    key: &str,
) -> CliResult<bool> {
    let found = manager(client, kind, group).exists(key)?;
    println!("{found}");
    Ok(found)
}

/// Prints the identities, or names, of every resource.
pub fn list(
    client: &ManageClient,
    kind: ResourceKind,
    group: Option<&str>,
    names: bool,
    format: &str,
) -> CliResult<Vec<String>> {
    let manager = manager(client, kind, group);
    let items = if names {
        manager.list_names()?
    } else {
        manager.list_identities()?
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&items)?),
        _ => {
            for item in &items {
                println!("{item}");
            }
        }
    }
    Ok(items)
}

/// Runs a bulk operation.
pub fn bulk(
    client: &ManageClient,
    kind: ResourceKind,
    group: Option<&str>,
    operation: BulkOperation,
) -> CliResult<()> {
    let manager = manager(client, kind, group);
    match operation {
        BulkOperation::EnableAll => manager.enable_all()?,
        BulkOperation::DisableAll => manager.disable_all()?,
        BulkOperation::DeleteAll => manager.delete_all()?,
    }
    let stats = manager.stats();
    println!("✓ {operation:?} finished for {kind} ({} deleted)", stats.deletes);
    Ok(())
}
