//! Apply command implementation.

use crate::error::{CliError, CliResult};
use crate::ledger::Ledger;
use mgmtsync_engine::{ResourceKind, ResourceManager};
use mgmtsync_payload::Payload;
use mgmtsync_transport::ManageClient;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome for one payload file.
#[derive(Debug, Serialize)]
pub struct ApplyResult {
    /// Payload file.
    pub file: String,
    /// Resource kind.
    pub kind: String,
    /// `created`, `updated`, `recreated` or `skipped`.
    pub action: String,
    /// Identity of the saved resource, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// Runs the apply command.
pub fn run(
    client: &ManageClient,
    kind: ResourceKind,
    group: Option<&str>,
    files: &[PathBuf],
    ledger_path: Option<&Path>,
    format: &str,
) -> CliResult<()> {
    let results = apply_files(client, kind, group, files, ledger_path)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => {
            for result in &results {
                match &result.resource_id {
                    Some(id) => println!("{} {} {} ({})", result.action, result.kind, id, result.file),
                    None => println!("{} {} ({})", result.action, result.kind, result.file),
                }
            }
        }
    }
    Ok(())
}

/// Saves every file in order and returns what happened to each.
///
/// Stops at the first failure. Hashes of files saved before the failure are
/// still written to the ledger.
pub fn apply_files(
    client: &ManageClient,
    kind: ResourceKind,
    group: Option<&str>,
    files: &[PathBuf],
    ledger_path: Option<&Path>,
) -> CliResult<Vec<ApplyResult>> {
    if files.is_empty() {
        return Err(CliError::InvalidArgument("no payload files given".into()));
    }

    let mut manager = ResourceManager::new(client, kind);
    if let Some(group) = group {
        manager = manager.with_group(group);
    }
    let mut ledger = ledger_path.map(Ledger::open).transpose()?;
    let target = match manager.paths().group() {
        Some(group) => format!("{kind}:{group}"),
        None => kind.to_string(),
    };

    let mut results = Vec::with_capacity(files.len());
    let outcome = files.iter().try_for_each(|file| -> CliResult<()> {
        let text = fs::read_to_string(file).map_err(|e| CliError::io(file, e))?;

        if ledger.as_ref().is_some_and(|l| l.is_unchanged(&target, file, &text)) {
            info!("Skipping unchanged {}", file.display());
            results.push(ApplyResult {
                file: file.display().to_string(),
                kind: kind.to_string(),
                action: "skipped".into(),
                resource_id: None,
            });
            return Ok(());
        }

        let receipt = manager.create_or_update(&Payload::new(text.as_str()))?;
        if let Some(ledger) = ledger.as_mut() {
            ledger.record(&target, file, &text);
        }
        results.push(ApplyResult {
            file: file.display().to_string(),
            kind: kind.to_string(),
            action: receipt.action().to_string(),
            resource_id: receipt.resource_id().map(str::to_string),
        });
        Ok(())
    });

    if let Some(ledger) = ledger.as_mut() {
        ledger.save()?;
        if !ledger.is_empty() {
            info!("Ledger now tracks {} files", ledger.len());
        }
    }
    outcome?;
    Ok(results)
}
