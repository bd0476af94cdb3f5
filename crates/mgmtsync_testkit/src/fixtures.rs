//! Configurations and payloads shared by tests.

use mgmtsync_payload::Payload;
use mgmtsync_transport::ManageConfig;
use serde_json::{json, Map, Value};

/// Collection path of users.
pub const USERS: &str = "/manage/v2/users";
/// Collection path of roles.
pub const ROLES: &str = "/manage/v2/roles";
/// Collection path of protected paths.
pub const PROTECTED_PATHS: &str = "/manage/v2/protected-paths";
/// Collection path of tasks.
pub const TASKS: &str = "/manage/v2/tasks";

/// A configuration with a single operating identity.
pub fn single_user_config() -> ManageConfig {
    ManageConfig::new("localhost").with_credentials("deployer", "deployer-pw")
}

/// A configuration with a distinct elevated identity.
pub fn elevated_config() -> ManageConfig {
    single_user_config().with_security_credentials("security-admin", "security-pw")
}

/// `{"user-name": name, "password": "changeme"}`
pub fn user_payload(name: &str) -> Payload {
    Payload::from_json(&json!({"user-name": name, "password": "changeme"}))
}

/// A role with one granted role.
pub fn role_payload(name: &str) -> Payload {
    Payload::from_json(&json!({"role-name": name, "role": ["rest-reader"]}))
}

/// A protected path for `expression` with no namespaces.
pub fn protected_path_payload(expression: &str) -> Payload {
    Payload::from_json(&json!({
        "path-expression": expression,
        "path-namespace": [],
        "permission": [{"role-name": "rest-reader", "capability": "read"}]
    }))
}

/// Builder for scheduled task payloads.
#[derive(Debug, Clone)]
pub struct TaskFixture {
    fields: Map<String, Value>,
}

impl TaskFixture {
    /// A daily task running `path`.
    pub fn new(path: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("task-path".into(), json!(path));
        fields.insert("task-type".into(), json!("daily"));
        fields.insert("task-period".into(), json!(1));
        fields.insert("task-start-time".into(), json!("01:00:00"));
        Self { fields }
    }

    /// Sets `task-database`.
    pub fn database(self, database: &str) -> Self {
        self.with("task-database", json!(database))
    }

    /// Sets `task-root`.
    pub fn root(self, root: &str) -> Self {
        self.with("task-root", json!(root))
    }

    /// Sets `task-enabled`.
    pub fn enabled(self, enabled: bool) -> Self {
        self.with("task-enabled", json!(enabled))
    }

    /// Sets `task-id`.
    pub fn id(self, id: &str) -> Self {
        self.with("task-id", json!(id))
    }

    /// Sets any field.
    pub fn with(mut self, field: &str, value: Value) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }

    /// The fields as a JSON object, for seeding a server.
    pub fn properties(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// The fields as a payload.
    pub fn payload(&self) -> Payload {
        Payload::from_json(&self.properties())
    }
}

/// A self-signed certificate authority in PEM form.
pub const TEST_CA_PEM: &str = "-----BEGIN CERTIFICATE-----
MIIBszCCAVmgAwIBAgIUQ2VydGlmaWNhdGVBdXRob3JpdHkwCgYIKoZIzj0EAwIw
FjEUMBIGA1UEAwwLbWdtdHN5bmMtY2EwHhcNMjQwMTAxMDAwMDAwWhcNMzQwMTAx
-----END CERTIFICATE-----
";
