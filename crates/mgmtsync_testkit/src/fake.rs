//! In-memory management server.
//!
//! [`FakeManageServer`] answers management API requests from memory, closely
//! enough to exercise reconciliation end to end:
//!
//! - collections render XML listings with `list-count`, `idref`, `nameref`
//!   and per-collection listing fields
//! - creates return `201` with a `Location` header
//! - task creates ignore `task-enabled: false`, and task updates reject any
//!   field other than `task-enabled`
//! - task collections are scoped by the `group-id` parameter
//! - task servers and the request count of each can be scripted
//!
//! Every request is recorded with the channel that carried it.

use mgmtsync_payload::{strip_comments, Payload};
use mgmtsync_transport::{
    HttpClient, HttpMethod, ManageClient, ManageConfig, ManageRequest, ManageResponse,
    TransportError, TransportResult,
};
use parking_lot::Mutex;
use quick_xml::escape::escape;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;

/// Group used when a scoped request names none.
pub const FAKE_DEFAULT_GROUP: &str = "Default";

const TASK_SERVERS: &str = "/manage/v2/task-servers";
const REQUESTS: &str = "/manage/v2/requests";

/// Which client channel carried a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// The operating identity.
    Primary,
    /// The elevated identity.
    Secondary,
}

/// One request as the server saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Method.
    pub method: HttpMethod,
    /// Path including the query string.
    pub path: String,
    /// Body, if any.
    pub body: Option<String>,
    /// Channel that carried the request.
    pub channel: Channel,
}

impl RecordedCall {
    /// Returns the body parsed as JSON, or `Null`.
    pub fn json_body(&self) -> Value {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
            .unwrap_or(Value::Null)
    }

    /// Returns true for anything but GET.
    pub fn is_mutation(&self) -> bool {
        self.method != HttpMethod::Get
    }
}

/// How the fake treats one collection.
#[derive(Debug, Clone, Copy)]
struct Rules {
    path: &'static str,
    /// Identity field added to properties documents.
    id_field: Option<&'static str>,
    /// Field rendered as `nameref`, which also addresses the resource.
    name_field: Option<&'static str>,
    /// Extra fields copied into listing entries.
    listing_fields: &'static [&'static str],
    group_scoped: bool,
    /// The only field an update may carry besides the identity.
    mutable_field: Option<&'static str>,
    /// Field the create endpoint forces to `true`.
    forced_enabled: Option<&'static str>,
    text_body: bool,
}

const RULES: &[Rules] = &[
    Rules {
        path: "/manage/v2/users",
        id_field: None,
        name_field: Some("user-name"),
        listing_fields: &[],
        group_scoped: false,
        mutable_field: None,
        forced_enabled: None,
        text_body: false,
    },
    Rules {
        path: "/manage/v2/roles",
        id_field: None,
        name_field: Some("role-name"),
        listing_fields: &[],
        group_scoped: false,
        mutable_field: None,
        forced_enabled: None,
        text_body: false,
    },
    Rules {
        path: "/manage/v2/certificate-templates",
        id_field: None,
        name_field: Some("template-name"),
        listing_fields: &[],
        group_scoped: false,
        mutable_field: None,
        forced_enabled: None,
        text_body: false,
    },
    Rules {
        path: "/manage/v2/protected-paths",
        id_field: Some("path-id"),
        name_field: Some("path-expression"),
        listing_fields: &[],
        group_scoped: false,
        mutable_field: None,
        forced_enabled: None,
        text_body: false,
    },
    Rules {
        path: "/manage/v2/tasks",
        id_field: Some("task-id"),
        name_field: None,
        listing_fields: &["task-path", "task-database"],
        group_scoped: true,
        mutable_field: Some("task-enabled"),
        forced_enabled: Some("task-enabled"),
        text_body: false,
    },
    Rules {
        path: "/manage/v2/certificate-authorities",
        id_field: Some("certificate-id"),
        name_field: None,
        listing_fields: &[],
        group_scoped: false,
        mutable_field: None,
        forced_enabled: None,
        text_body: true,
    },
];

fn rules_for(path: &str) -> Option<&'static Rules> {
    RULES.iter().find(|r| r.path == path)
}

#[derive(Debug, Clone)]
struct StoredResource {
    id: String,
    group: Option<String>,
    properties: Map<String, Value>,
}

impl StoredResource {
    fn name(&self, rules: &Rules) -> Option<String> {
        rules
            .name_field
            .and_then(|f| self.properties.get(f))
            .map(scalar_text)
    }

    fn properties_document(&self, rules: &Rules) -> Value {
        let mut doc = Map::new();
        if let Some(field) = rules.id_field {
            doc.insert(field.to_string(), Value::String(self.id.clone()));
        }
        for (k, v) in &self.properties {
            doc.insert(k.clone(), v.clone());
        }
        Value::Object(doc)
    }
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    method: HttpMethod,
    path_fragment: String,
    status: u16,
}

#[derive(Debug, Default)]
struct FakeState {
    collections: BTreeMap<&'static str, Vec<StoredResource>>,
    next_id: u64,
    calls: Vec<RecordedCall>,
    failures: Vec<ScriptedFailure>,
    task_servers: Vec<(String, String)>,
    request_counts: VecDeque<u64>,
    omit_location: bool,
    unreachable: bool,
}

impl FakeState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        (10_000 + self.next_id).to_string()
    }
}

/// In-memory management server. Clones share state.
#[derive(Clone, Default)]
pub struct FakeManageServer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeManageServer {
    /// Creates an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a channel handle that records requests as `channel`.
    pub fn channel(&self, channel: Channel) -> Arc<dyn HttpClient> {
        Arc::new(FakeChannel {
            server: self.clone(),
            channel,
        })
    }

    /// Builds a client over this server.
    ///
    /// Elevated requests get their own channel when `config` names a
    /// distinct security user, as with a real connection.
    pub fn client(&self, config: ManageConfig) -> ManageClient {
        let secondary = config
            .has_elevated_identity()
            .then(|| self.channel(Channel::Secondary));
        ManageClient::with_channels(config, self.channel(Channel::Primary), secondary)
    }

    /// Stores a resource directly and returns its generated `idref`.
    ///
    /// Named resources can also be addressed by name.
    pub fn seed(&self, collection: &str, group: Option<&str>, properties: Value) -> String {
        let rules = rules_for(collection).unwrap_or_else(|| panic!("unknown collection {collection}"));
        let mut state = self.state.lock();
        let id = state.allocate_id();
        let properties = match properties {
            Value::Object(map) => map,
            other => panic!("seed properties must be an object, got {other}"),
        };
        let group = rules
            .group_scoped
            .then(|| group.unwrap_or(FAKE_DEFAULT_GROUP).to_string());
        state
            .collections
            .entry(rules.path)
            .or_default()
            .push(StoredResource {
                id: id.clone(),
                group,
                properties,
            });
        id
    }

    /// Returns the properties documents of a collection in creation order.
    pub fn resources(&self, collection: &str) -> Vec<Value> {
        let Some(rules) = rules_for(collection) else {
            return Vec::new();
        };
        self.state
            .lock()
            .collections
            .get(rules.path)
            .map(|items| items.iter().map(|r| r.properties_document(rules)).collect())
            .unwrap_or_default()
    }

    /// Returns the properties of the resource with this id or name.
    pub fn resource(&self, collection: &str, key: &str) -> Option<Value> {
        let rules = rules_for(collection)?;
        let state = self.state.lock();
        state
            .collections
            .get(rules.path)?
            .iter()
            .find(|r| r.id == key || r.name(rules).as_deref() == Some(key))
            .map(|r| r.properties_document(rules))
    }

    /// Registers a task server for a group.
    pub fn add_task_server(&self, id: &str, group: &str) {
        self.state
            .lock()
            .task_servers
            .push((id.to_string(), group.to_string()));
    }

    /// Queues the request counts returned by successive polls. Polls past
    /// the end of the queue see zero.
    pub fn script_request_counts(&self, counts: impl IntoIterator<Item = u64>) {
        self.state.lock().request_counts.extend(counts);
    }

    /// Makes every request with `method` whose path contains `fragment`
    /// fail with `status`.
    pub fn fail_on(&self, method: HttpMethod, fragment: &str, status: u16) {
        self.state.lock().failures.push(ScriptedFailure {
            method,
            path_fragment: fragment.to_string(),
            status,
        });
    }

    /// Drops the `Location` header from create responses.
    pub fn omit_location_headers(&self) {
        self.state.lock().omit_location = true;
    }

    /// Makes every request fail at the transport level.
    pub fn go_offline(&self) {
        self.state.lock().unreachable = true;
    }

    /// Returns every recorded request.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the recorded requests other than GETs.
    pub fn mutations(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Returns the recorded requests whose path starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Forgets recorded requests.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn handle(&self, request: &ManageRequest, channel: Channel) -> TransportResult<ManageResponse> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            method: request.method,
            path: request.path.clone(),
            body: request.body.clone(),
            channel,
        });

        if state.unreachable {
            return Err(TransportError::io("connection refused"));
        }
        if let Some(failure) = state
            .failures
            .iter()
            .find(|f| f.method == request.method && request.path.contains(&f.path_fragment))
        {
            return Ok(ManageResponse::new(
                failure.status,
                format!("scripted failure for {} {}", request.method, request.path),
            ));
        }

        let (base, query) = split_query(&request.path);
        let group_param = query_param(query, "group-id");

        if base == TASK_SERVERS && request.method == HttpMethod::Get {
            return Ok(task_server_listing(&state.task_servers));
        }
        if base == REQUESTS && request.method == HttpMethod::Get {
            let count = state.request_counts.pop_front().unwrap_or(0);
            return Ok(count_listing(count));
        }

        if let Some(rules) = rules_for(base) {
            let group = rules
                .group_scoped
                .then(|| group_param.unwrap_or(FAKE_DEFAULT_GROUP).to_string());
            return Ok(match request.method {
                HttpMethod::Get => collection_listing(&state, rules, group.as_deref()),
                HttpMethod::Post => create(&mut state, rules, group, request),
                _ => ManageResponse::new(405, "method not allowed"),
            });
        }

        let Some((rules, key, properties)) = resource_path(base) else {
            return Ok(ManageResponse::new(404, format!("no endpoint {base}")));
        };
        let group = rules
            .group_scoped
            .then(|| group_param.unwrap_or(FAKE_DEFAULT_GROUP).to_string());
        let items = state.collections.entry(rules.path).or_default();
        let Some(index) = items.iter().position(|r| {
            (r.id == key || r.name(rules).as_deref() == Some(key)) && r.group == group
        }) else {
            return Ok(ManageResponse::new(404, format!("no resource {key}")));
        };

        Ok(match (request.method, properties) {
            (HttpMethod::Get, _) => ManageResponse::new(
                200,
                items[index].properties_document(rules).to_string(),
            ),
            (HttpMethod::Put, true) => update(&mut items[index], rules, request),
            (HttpMethod::Delete, false) => {
                items.remove(index);
                ManageResponse::new(204, "")
            }
            _ => ManageResponse::new(405, "method not allowed"),
        })
    }
}

struct FakeChannel {
    server: FakeManageServer,
    channel: Channel,
}

impl HttpClient for FakeChannel {
    fn execute(&self, request: &ManageRequest) -> TransportResult<ManageResponse> {
        self.server.handle(request, self.channel)
    }
}

fn create(
    state: &mut FakeState,
    rules: &'static Rules,
    group: Option<String>,
    request: &ManageRequest,
) -> ManageResponse {
    let body = request.body.as_deref().unwrap_or_default();
    let mut properties = if rules.text_body {
        let mut map = Map::new();
        map.insert("pem".to_string(), Value::String(body.to_string()));
        map
    } else {
        match parse_body(body) {
            Ok(map) => map,
            Err(message) => return ManageResponse::new(400, message),
        }
    };

    if let Some(field) = rules.name_field {
        let Some(name) = properties.get(field).map(scalar_text) else {
            return ManageResponse::new(400, format!("missing {field}"));
        };
        let exists = state
            .collections
            .get(rules.path)
            .is_some_and(|items| items.iter().any(|r| r.name(rules).as_deref() == Some(&name)));
        if exists {
            return ManageResponse::new(400, format!("{name} already exists"));
        }
    }
    if let Some(field) = rules.forced_enabled {
        properties.insert(field.to_string(), Value::Bool(true));
    }
    if let Some(field) = rules.id_field {
        properties.remove(field);
    }

    let id = state.allocate_id();
    let resource = StoredResource {
        id: id.clone(),
        group,
        properties,
    };
    let address = match rules.id_field {
        Some(_) => id,
        None => resource.name(rules).unwrap_or(id),
    };
    state
        .collections
        .entry(rules.path)
        .or_default()
        .push(resource);

    let response = ManageResponse::new(201, "");
    if state.omit_location {
        response
    } else {
        response.with_location(format!("{}/{address}", rules.path))
    }
}

fn update(resource: &mut StoredResource, rules: &Rules, request: &ManageRequest) -> ManageResponse {
    let changes = match parse_body(request.body.as_deref().unwrap_or_default()) {
        Ok(map) => map,
        Err(message) => return ManageResponse::new(400, message),
    };
    if let Some(allowed) = rules.mutable_field {
        let identity = rules.id_field.unwrap_or_default();
        if let Some(field) = changes.keys().find(|k| k.as_str() != allowed && k.as_str() != identity) {
            return ManageResponse::new(
                400,
                format!("XDMP-UPDATE: {field} cannot be updated, only {allowed}"),
            );
        }
    }
    for (k, v) in changes {
        if Some(k.as_str()) != rules.id_field {
            resource.properties.insert(k, v);
        }
    }
    ManageResponse::new(204, "")
}

fn parse_body(body: &str) -> Result<Map<String, Value>, String> {
    let payload = Payload::new(body);
    if payload.is_json() {
        let text = strip_comments(body).map_err(|e| e.to_string())?;
        match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err("body is not a JSON object".to_string()),
            Err(e) => Err(e.to_string()),
        }
    } else {
        let fields = payload.top_level_fields().map_err(|e| e.to_string())?;
        Ok(fields
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect())
    }
}

fn collection_listing(state: &FakeState, rules: &Rules, group: Option<&str>) -> ManageResponse {
    let items: Vec<_> = state
        .collections
        .get(rules.path)
        .map(|items| {
            items
                .iter()
                .filter(|r| r.group.as_deref() == group)
                .collect()
        })
        .unwrap_or_default();

    let mut xml = String::new();
    let _ = write!(xml, "<list-count units=\"quantity\">{}</list-count>", items.len());
    for item in items {
        xml.push_str("<list-item>");
        element(&mut xml, "idref", &item.id);
        if let Some(name) = item.name(rules) {
            element(&mut xml, "nameref", &name);
        }
        for field in rules.listing_fields {
            if let Some(value) = item.properties.get(*field) {
                element(&mut xml, field, &scalar_text(value));
            }
        }
        xml.push_str("</list-item>");
    }
    listing_response(&xml)
}

fn task_server_listing(servers: &[(String, String)]) -> ManageResponse {
    let mut xml = String::new();
    let _ = write!(xml, "<list-count units=\"quantity\">{}</list-count>", servers.len());
    for (id, group) in servers {
        xml.push_str("<list-item>");
        element(&mut xml, "idref", id);
        element(&mut xml, "nameref", "TaskServer");
        element(&mut xml, "groupnameref", group);
        xml.push_str("</list-item>");
    }
    listing_response(&xml)
}

fn count_listing(count: u64) -> ManageResponse {
    listing_response(&format!(
        "<list-count units=\"quantity\">{count}</list-count>"
    ))
}

fn listing_response(items: &str) -> ManageResponse {
    ManageResponse::new(
        200,
        format!("<x-default-list><list-items>{items}</list-items></x-default-list>"),
    )
}

fn element(xml: &mut String, name: &str, text: &str) {
    let _ = write!(xml, "<{name}>{}</{name}>", escape(text));
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn split_query(path: &str) -> (&str, &str) {
    path.split_once('?').unwrap_or((path, ""))
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// Splits `C/<key>` or `C/<key>/properties` into its parts.
fn resource_path(base: &str) -> Option<(&'static Rules, &str, bool)> {
    RULES.iter().find_map(|rules| {
        let rest = base.strip_prefix(rules.path)?.strip_prefix('/')?;
        match rest.split_once('/') {
            None if !rest.is_empty() => Some((rules, rest, false)),
            Some((key, "properties")) => Some((rules, key, true)),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgmtsync_payload::ListingDocument;

    fn primary(server: &FakeManageServer) -> Arc<dyn HttpClient> {
        server.channel(Channel::Primary)
    }

    fn send(server: &FakeManageServer, method: HttpMethod, path: &str, body: Option<&str>) -> ManageResponse {
        let mut request = ManageRequest::new(method, path);
        request.body = body.map(str::to_string);
        primary(server).execute(&request).unwrap()
    }

    #[test]
    fn created_tasks_are_listed_per_group() {
        let server = FakeManageServer::new();
        let created = send(
            &server,
            HttpMethod::Post,
            "/manage/v2/tasks?group-id=Default",
            Some(r#"{"task-path":"/a.xqy","task-enabled":false}"#),
        );
        assert_eq!(created.status_code(), 201);
        let id = created.location_id().unwrap().to_string();

        let listing = send(&server, HttpMethod::Get, "/manage/v2/tasks?group-id=Default", None);
        let doc = ListingDocument::parse(listing.body()).unwrap();
        assert_eq!(doc.id_refs(), [id.clone()]);
        assert_eq!(doc.values("task-path"), ["/a.xqy"]);

        let other = send(&server, HttpMethod::Get, "/manage/v2/tasks?group-id=Evaluator", None);
        assert!(ListingDocument::parse(other.body()).unwrap().is_empty());

        let stored = server.resource("/manage/v2/tasks", &id).unwrap();
        assert_eq!(stored["task-enabled"], Value::Bool(true));
    }

    #[test]
    fn task_updates_only_accept_enabled_flag() {
        let server = FakeManageServer::new();
        let id = server.seed("/manage/v2/tasks", None, serde_json::json!({"task-path": "/a.xqy"}));
        let path = format!("/manage/v2/tasks/{id}/properties?group-id=Default");

        let rejected = send(&server, HttpMethod::Put, &path, Some(r#"{"task-root":"/x/"}"#));
        assert_eq!(rejected.status_code(), 400);

        let body = format!(r#"{{"task-id":"{id}","task-enabled":false}}"#);
        let accepted = send(&server, HttpMethod::Put, &path, Some(&body));
        assert_eq!(accepted.status_code(), 204);
    }

    #[test]
    fn named_resources_are_addressed_by_name() {
        let server = FakeManageServer::new();
        let created = send(&server, HttpMethod::Post, "/manage/v2/roles", Some(r#"{"role-name":"r1"}"#));
        assert_eq!(created.location_id(), Some("r1"));

        let duplicate = send(&server, HttpMethod::Post, "/manage/v2/roles", Some(r#"{"role-name":"r1"}"#));
        assert_eq!(duplicate.status_code(), 400);

        assert_eq!(send(&server, HttpMethod::Delete, "/manage/v2/roles/r1", None).status_code(), 204);
        assert_eq!(send(&server, HttpMethod::Delete, "/manage/v2/roles/r1", None).status_code(), 404);
    }

    #[test]
    fn request_counts_follow_script() {
        let server = FakeManageServer::new();
        server.script_request_counts([2]);
        let first = send(&server, HttpMethod::Get, "/manage/v2/requests?server-id=1", None);
        let second = send(&server, HttpMethod::Get, "/manage/v2/requests?server-id=1", None);
        assert_eq!(ListingDocument::parse(first.body()).unwrap().list_count(), Some(2));
        assert_eq!(ListingDocument::parse(second.body()).unwrap().list_count(), Some(0));
    }

    #[test]
    fn records_channel_and_failures() {
        let server = FakeManageServer::new();
        server.fail_on(HttpMethod::Delete, "/users/", 500);
        let secondary = server.channel(Channel::Secondary);
        let response = secondary
            .execute(&ManageRequest::new(HttpMethod::Delete, "/manage/v2/users/jane"))
            .unwrap();
        assert_eq!(response.status_code(), 500);
        assert_eq!(server.calls()[0].channel, Channel::Secondary);
        assert_eq!(server.mutations().len(), 1);
    }
}
