//! Per-kind reconciliation.

use crate::error::{ensure_success, ReconcileError, ReconcileResult};
use crate::kind::{KindSpec, ResourceKind, ResourcePaths, UpdateStrategy};
use crate::listing::ListingAccessor;
use crate::receipt::{DeleteOutcome, SaveAction, SaveReceipt, WaitOutcome};
use crate::resolve::{disambiguate, resolve_identity, secondary_predicate, Resolution};
use crate::wait::{self, Sleeper, ThreadSleeper};
use mgmtsync_payload::{Payload, Predicate};
use mgmtsync_transport::{HttpMethod, ManageClient, ManageResponse};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Phase of the most recent reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// No call has run yet.
    Idle,
    /// Looking up the existing resource.
    ResolvingIdentity,
    /// Creating a resource.
    Creating,
    /// Updating a resource.
    Updating,
    /// Disabling a resource the server created enabled.
    DisablingFixup,
    /// The last call succeeded.
    Done,
    /// The last call failed.
    Failed,
}

impl ReconcileState {
    /// Returns true while a call is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::ResolvingIdentity | Self::Creating | Self::Updating | Self::DisablingFixup
        )
    }
}

/// Counters over the manager's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Resources created.
    pub creates: u64,
    /// Resources updated in place.
    pub updates: u64,
    /// Resources deleted and created again.
    pub recreates: u64,
    /// Disabling fixups issued.
    pub fixups: u64,
    /// Resources deleted.
    pub deletes: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Reconciles payloads of one resource kind against the server.
pub struct ResourceManager<'a> {
    client: &'a ManageClient,
    kind: ResourceKind,
    paths: ResourcePaths,
    sleeper: Arc<dyn Sleeper>,
    state: RwLock<ReconcileState>,
    stats: RwLock<ReconcileStats>,
}

impl<'a> ResourceManager<'a> {
    /// Creates a manager for `kind`. Group-scoped kinds use the default group.
    pub fn new(client: &'a ManageClient, kind: ResourceKind) -> Self {
        Self {
            client,
            kind,
            paths: ResourcePaths::new(kind.spec(), None),
            sleeper: Arc::new(ThreadSleeper),
            state: RwLock::new(ReconcileState::Idle),
            stats: RwLock::new(ReconcileStats::default()),
        }
    }

    /// Sets the group for group-scoped kinds.
    pub fn with_group(mut self, group: impl AsRef<str>) -> Self {
        self.paths = ResourcePaths::new(self.kind.spec(), Some(group.as_ref()));
        self
    }

    /// Replaces the sleeper used between completion polls.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the request paths.
    pub fn paths(&self) -> &ResourcePaths {
        &self.paths
    }

    /// Returns the state of the last call.
    pub fn state(&self) -> ReconcileState {
        *self.state.read()
    }

    /// Returns the counters.
    pub fn stats(&self) -> ReconcileStats {
        self.stats.read().clone()
    }

    /// Returns a listing accessor using this kind's identity.
    pub fn listing(&self) -> ListingAccessor<'a> {
        ListingAccessor::new(self.client, self.spec().elevated)
    }

    fn spec(&self) -> &'static KindSpec {
        self.kind.spec()
    }

    fn set_state(&self, state: ReconcileState) {
        *self.state.write() = state;
    }

    /// Records the outcome of a call in state and stats.
    fn finish<T>(&self, result: ReconcileResult<T>) -> ReconcileResult<T> {
        match &result {
            Ok(_) => self.set_state(ReconcileState::Done),
            Err(e) => {
                self.set_state(ReconcileState::Failed);
                self.stats.write().last_error = Some(e.to_string());
            }
        }
        result
    }

    /// Creates the resource described by `payload`, or updates it if it exists.
    pub fn create_or_update(&self, payload: &Payload) -> ReconcileResult<SaveReceipt> {
        let result = self.resolve_target(payload).and_then(|target| match target {
            Target::Existing(id) => self.update(payload, &id),
            Target::New(key) => self.create(payload, key, SaveAction::Created),
        });
        self.finish(result)
    }

    /// Deletes the resource whose identity or alias field equals `key`.
    pub fn delete(&self, key: &str) -> ReconcileResult<DeleteOutcome> {
        let result = self.delete_by_key(key);
        self.finish(result)
    }

    /// Deletes the resource described by `payload`.
    pub fn delete_payload(&self, payload: &Payload) -> ReconcileResult<DeleteOutcome> {
        let result = self.resolve_target(payload).and_then(|target| match target {
            Target::Existing(id) => {
                self.delete_by_id(&id)?;
                Ok(DeleteOutcome::Deleted(id))
            }
            Target::New(key) => {
                warn!(
                    "Could not find {} {}, so not deleting it",
                    self.spec().name,
                    key.as_deref().unwrap_or("matching payload")
                );
                Ok(DeleteOutcome::NotFound)
            }
        });
        self.finish(result)
    }

    /// Returns true if a resource's identity or alias field equals `key`.
    pub fn exists(&self, key: &str) -> ReconcileResult<bool> {
        info!("Checking for existence of {}: {}", self.spec().name, key);
        self.listing()
            .exists(&self.paths.collection(), &self.alias_predicate(key))
    }

    /// Returns the identities of every resource of this kind.
    pub fn list_identities(&self) -> ReconcileResult<Vec<String>> {
        self.listing().list_identities(&self.paths.collection())
    }

    /// Returns the names of every resource of this kind.
    pub fn list_names(&self) -> ReconcileResult<Vec<String>> {
        self.listing().list_names(&self.paths.collection())
    }

    /// Enables every resource. Stops at the first failure.
    pub fn enable_all(&self) -> ReconcileResult<()> {
        let result = self.toggle_all(true, "enable-all");
        self.finish(result)
    }

    /// Disables every resource. Stops at the first failure.
    pub fn disable_all(&self) -> ReconcileResult<()> {
        let result = self.toggle_all(false, "disable-all");
        self.finish(result)
    }

    /// Deletes every resource. Stops at the first failure.
    pub fn delete_all(&self) -> ReconcileResult<()> {
        let result = self.list_identities().and_then(|ids| {
            info!("Deleting {} {} resources", ids.len(), self.spec().name);
            ids.iter().try_for_each(|id| self.delete_by_id(id))
        });
        self.finish(result)
    }

    /// Sets the toggle field of one resource.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> ReconcileResult<()> {
        let Some(field) = self.spec().toggle_field else {
            return Err(ReconcileError::UnsupportedOperation {
                kind: self.spec().name,
                operation: if enabled { "enable" } else { "disable" },
            });
        };
        let body = self.property_update(id, field, Value::Bool(enabled));
        let path = self.paths.properties(id);
        self.put(&path, &body)?;
        Ok(())
    }

    /// Blocks until the task server of `group` has no running requests.
    pub fn wait_for_group_completion(
        &self,
        group: &str,
        interval: Duration,
    ) -> ReconcileResult<WaitOutcome> {
        wait::wait_for_group_completion(self.client, group, interval, self.sleeper.as_ref())
    }

    fn toggle_all(&self, enabled: bool, operation: &'static str) -> ReconcileResult<()> {
        if self.spec().toggle_field.is_none() {
            return Err(ReconcileError::UnsupportedOperation {
                kind: self.spec().name,
                operation,
            });
        }
        for id in self.list_identities()? {
            self.set_enabled(&id, enabled)?;
        }
        Ok(())
    }

    fn resolve_target(&self, payload: &Payload) -> ReconcileResult<Target> {
        self.set_state(ReconcileState::ResolvingIdentity);
        let snapshot = self.listing().snapshot(&self.paths.collection())?;

        Ok(match resolve_identity(self.kind, payload, &snapshot)? {
            Resolution::Existing(id) => Target::Existing(id),
            Resolution::Absent { key } => Target::New(key),
            Resolution::Ambiguous { candidates } => {
                debug!(
                    "{} candidates for {}; comparing properties",
                    candidates.len(),
                    self.spec().name
                );
                match disambiguate(self.kind, payload, &candidates, |id| {
                    self.fetch_properties(id)
                })? {
                    Some(id) => Target::Existing(id),
                    None => Target::New(None),
                }
            }
        })
    }

    fn fetch_properties(&self, id: &str) -> ReconcileResult<Payload> {
        let path = self.paths.properties(id);
        let response = self.client.get_json(&path, self.spec().elevated)?;
        let response = ensure_success(HttpMethod::Get, &path, response)?;
        Ok(Payload::new(response.body()))
    }

    fn create(
        &self,
        payload: &Payload,
        key: Option<String>,
        action: SaveAction,
    ) -> ReconcileResult<SaveReceipt> {
        self.set_state(ReconcileState::Creating);
        let path = self.paths.collection();
        info!("Creating {}: {}", self.spec().name, self.describe(payload, key.as_deref()));

        let response = self.post(&path, payload)?;
        let resource_id = response.location_id().map(str::to_string).or(key);

        if self.apply_disable_fixup(payload, &response, &path)? {
            self.stats.write().fixups += 1;
        }

        {
            let mut stats = self.stats.write();
            match action {
                SaveAction::Recreated => stats.recreates += 1,
                _ => stats.creates += 1,
            }
        }
        info!("Created {}: {}", self.spec().name, resource_id.as_deref().unwrap_or("?"));
        Ok(SaveReceipt::new(resource_id, payload.clone(), path, response, action))
    }

    fn update(&self, payload: &Payload, id: &str) -> ReconcileResult<SaveReceipt> {
        self.set_state(ReconcileState::Updating);
        let spec = self.spec();

        match spec.update_strategy {
            UpdateStrategy::DirectUpdate => {
                let path = self.paths.properties(id);
                info!("Updating {}: {}", spec.name, id);
                let response = self.put(&path, payload)?;
                self.stats.write().updates += 1;
                Ok(SaveReceipt::new(
                    Some(id.to_string()),
                    payload.clone(),
                    path,
                    response,
                    SaveAction::Updated,
                ))
            }
            UpdateStrategy::DeleteAndRecreate => {
                info!(
                    "Deleting {} first since updates are not allowed except for {}; id: {}",
                    spec.name,
                    spec.toggle_field.unwrap_or("no fields"),
                    id
                );
                self.delete_by_id(id)?;
                let stripped = payload.exclude_fields(&[spec.identity_field])?;
                self.create(&stripped, None, SaveAction::Recreated)
            }
        }
    }

    /// Issues the follow-up disable call when the create ignored it.
    fn apply_disable_fixup(
        &self,
        payload: &Payload,
        response: &ManageResponse,
        create_path: &str,
    ) -> ReconcileResult<bool> {
        let Some(fixup) = self.spec().disable_fixup else {
            return Ok(false);
        };
        let requested = payload
            .field(fixup.field)?
            .is_some_and(|v| v.eq_ignore_ascii_case(fixup.disabled_value));
        if !requested {
            return Ok(false);
        }

        let id = response
            .location_id()
            .ok_or_else(|| ReconcileError::MissingLocationHeader {
                path: create_path.to_string(),
            })?;

        self.set_state(ReconcileState::DisablingFixup);
        info!("Updating new {} so it is disabled; id: {}", self.spec().name, id);
        let disabled = serde_json::from_str::<Value>(fixup.disabled_value)
            .unwrap_or_else(|_| Value::String(fixup.disabled_value.to_string()));
        let body = self.property_update(id, fixup.field, disabled);
        self.put(&self.paths.properties(id), &body)?;
        Ok(true)
    }

    fn delete_by_key(&self, key: &str) -> ReconcileResult<DeleteOutcome> {
        self.set_state(ReconcileState::ResolvingIdentity);
        let predicate = self.alias_predicate(key);
        let mut ids = self
            .listing()
            .find_matching_identities(&self.paths.collection(), &predicate)?;

        match ids.len() {
            0 => {
                warn!("Could not find {} {}, so not deleting it", self.spec().name, key);
                Ok(DeleteOutcome::NotFound)
            }
            1 => {
                let id = ids.remove(0);
                self.delete_by_id(&id)?;
                Ok(DeleteOutcome::Deleted(id))
            }
            _ => Err(ReconcileError::AmbiguousResourceMatch {
                kind: self.spec().name,
                key: predicate.to_string(),
                candidates: ids,
            }),
        }
    }

    fn delete_by_id(&self, id: &str) -> ReconcileResult<()> {
        let path = self.paths.resource(id);
        info!("Deleting {}: {}", self.spec().name, id);
        let response = self
            .client
            .delete(&path, self.spec().elevated)?;
        ensure_success(HttpMethod::Delete, &path, response)?;
        self.stats.write().deletes += 1;
        Ok(())
    }

    fn post(&self, path: &str, payload: &Payload) -> ReconcileResult<ManageResponse> {
        let response = self.client.post_payload(path, payload, self.spec().elevated)?;
        ensure_success(HttpMethod::Post, path, response)
    }

    fn put(&self, path: &str, payload: &Payload) -> ReconcileResult<ManageResponse> {
        let response = self.client.put_payload(path, payload, self.spec().elevated)?;
        ensure_success(HttpMethod::Put, path, response)
    }

    /// `{"<identity field>": id, "<field>": value}`
    fn property_update(&self, id: &str, field: &str, value: Value) -> Payload {
        let mut body = Map::new();
        body.insert(self.spec().identity_field.to_string(), Value::String(id.to_string()));
        body.insert(field.to_string(), value);
        Payload::from_json(&Value::Object(body))
    }

    fn alias_predicate(&self, key: &str) -> Predicate {
        Predicate::any(
            self.spec()
                .alias_fields
                .iter()
                .map(|field| Predicate::eq(*field, key)),
        )
    }

    fn describe(&self, payload: &Payload, key: Option<&str>) -> String {
        if let Some(key) = key {
            return key.to_string();
        }
        match secondary_predicate(self.spec(), payload) {
            Ok(predicate) => predicate.to_string(),
            Err(_) => "(unnamed)".to_string(),
        }
    }
}

enum Target {
    Existing(String),
    New(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_activity() {
        assert!(ReconcileState::Creating.is_active());
        assert!(ReconcileState::DisablingFixup.is_active());
        assert!(!ReconcileState::Done.is_active());
        assert!(!ReconcileState::Idle.is_active());
    }
}
