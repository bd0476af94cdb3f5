//! Record of applied payload files.
//!
//! The ledger maps each payload file, together with the kind and group it
//! was applied to, to the SHA-256 of the contents last saved successfully,
//! so `apply --ledger` can skip files that have not changed since.

use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    files: BTreeMap<String, String>,
}

const LEDGER_VERSION: u32 = 2;

/// Hashes of previously applied payload files.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    files: BTreeMap<String, String>,
    dirty: bool,
}

impl Ledger {
    /// Loads the ledger at `path`, or starts an empty one if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> CliResult<Self> {
        let path = path.into();
        let files = match fs::read_to_string(&path) {
            Ok(text) => {
                let doc = serde_json::from_str::<LedgerFile>(&text)?;
                // Entries from older layouts lack the target and never match.
                if doc.version == LEDGER_VERSION {
                    doc.files
                } else {
                    BTreeMap::new()
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(CliError::io(path, e)),
        };
        Ok(Self {
            path,
            files,
            dirty: false,
        })
    }

    /// Returns true if `file` was last applied to `target` with exactly `contents`.
    ///
    /// `target` names where the file went, such as `task:Default`.
    pub fn is_unchanged(&self, target: &str, file: &Path, contents: &str) -> bool {
        self.files.get(&key(target, file)).map(String::as_str) == Some(hash(contents).as_str())
    }

    /// Records that `file` was applied to `target` with `contents`.
    pub fn record(&mut self, target: &str, file: &Path, contents: &str) {
        self.files.insert(key(target, file), hash(contents));
        self.dirty = true;
    }

    /// Number of recorded files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes the ledger if anything was recorded since it was opened.
    pub fn save(&mut self) -> CliResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let doc = LedgerFile {
            version: LEDGER_VERSION,
            files: self.files.clone(),
        };
        let text = serde_json::to_string_pretty(&doc)?;
        fs::write(&self.path, text).map_err(|e| CliError::io(&self.path, e))?;
        self.dirty = false;
        Ok(())
    }
}

fn key(target: &str, file: &Path) -> String {
    format!("{target}:{}", file.display())
}

fn hash(contents: &str) -> String {
    Sha256::digest(contents.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
