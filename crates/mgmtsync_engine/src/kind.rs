//! Static table of supported resource kinds.

use std::fmt;
use std::str::FromStr;

/// How a kind applies an update to an existing resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// `PUT` the payload to the resource's properties endpoint.
    DirectUpdate,
    /// Delete the resource, then create it again without its identity field.
    DeleteAndRecreate,
}

/// A payload field used to find a resource whose identity the server assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondaryKey {
    /// Field in the payload.
    pub payload_field: &'static str,
    /// Field of the listing entry it is compared against.
    pub listing_field: &'static str,
    /// Whether the payload must carry the field.
    pub required: bool,
}

/// Where a kind's identity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// The caller names the resource (e.g. `user-name`).
    Natural,
    /// The server generates the identity on create.
    ServerGenerated {
        /// Fields that locate an existing resource.
        secondary: &'static [SecondaryKey],
        /// Properties field that breaks ties between several matches.
        tertiary: Option<&'static str>,
    },
}

/// Follow-up update for kinds whose create endpoint ignores a disabled flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisableFixup {
    /// Flag field.
    pub field: &'static str,
    /// Payload value meaning "disabled", compared case-insensitively.
    pub disabled_value: &'static str,
}

/// Static description of one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    /// Short name used in logs and on the command line.
    pub name: &'static str,
    /// Collection path.
    pub collection: &'static str,
    /// Identity field in payloads and properties.
    pub identity_field: &'static str,
    /// Identity source.
    pub identity: IdentitySource,
    /// Whether requests need the elevated identity.
    pub elevated: bool,
    /// Whether every request carries `group-id`.
    pub group_scoped: bool,
    /// Update strategy.
    pub update_strategy: UpdateStrategy,
    /// Disabling fixup after create, if needed.
    pub disable_fixup: Option<DisableFixup>,
    /// Listing fields that may hold a caller-supplied key.
    pub alias_fields: &'static [&'static str],
    /// Boolean field toggled by enable-all and disable-all.
    pub toggle_field: Option<&'static str>,
}

/// Group used for group-scoped kinds when none is given.
pub const DEFAULT_GROUP: &str = "Default";

const TASK_KEYS: &[SecondaryKey] = &[
    SecondaryKey {
        payload_field: "task-path",
        listing_field: "task-path",
        required: true,
    },
    SecondaryKey {
        payload_field: "task-database",
        listing_field: "task-database",
        required: false,
    },
];

const PROTECTED_PATH_KEYS: &[SecondaryKey] = &[SecondaryKey {
    payload_field: "path-expression",
    listing_field: "nameref",
    required: true,
}];

static USER: KindSpec = KindSpec {
    name: "user",
    collection: "/manage/v2/users",
    identity_field: "user-name",
    identity: IdentitySource::Natural,
    elevated: true,
    group_scoped: false,
    update_strategy: UpdateStrategy::DirectUpdate,
    disable_fixup: None,
    alias_fields: &["idref", "nameref"],
    toggle_field: None,
};

static ROLE: KindSpec = KindSpec {
    name: "role",
    collection: "/manage/v2/roles",
    identity_field: "role-name",
    identity: IdentitySource::Natural,
    elevated: true,
    group_scoped: false,
    update_strategy: UpdateStrategy::DirectUpdate,
    disable_fixup: None,
    alias_fields: &["idref", "nameref"],
    toggle_field: None,
};

static CERTIFICATE_TEMPLATE: KindSpec = KindSpec {
    name: "certificate-template",
    collection: "/manage/v2/certificate-templates",
    identity_field: "template-name",
    identity: IdentitySource::Natural,
    elevated: true,
    group_scoped: false,
    update_strategy: UpdateStrategy::DirectUpdate,
    disable_fixup: None,
    alias_fields: &["idref", "nameref"],
    toggle_field: None,
};

static PROTECTED_PATH: KindSpec = KindSpec {
    name: "protected-path",
    collection: "/manage/v2/protected-paths",
    identity_field: "path-id",
    identity: IdentitySource::ServerGenerated {
        secondary: PROTECTED_PATH_KEYS,
        tertiary: None,
    },
    elevated: true,
    group_scoped: false,
    update_strategy: UpdateStrategy::DirectUpdate,
    disable_fixup: None,
    alias_fields: &["idref", "nameref"],
    toggle_field: None,
};

static TASK: KindSpec = KindSpec {
    name: "task",
    collection: "/manage/v2/tasks",
    identity_field: "task-id",
    identity: IdentitySource::ServerGenerated {
        secondary: TASK_KEYS,
        tertiary: Some("task-root"),
    },
    elevated: false,
    group_scoped: true,
    update_strategy: UpdateStrategy::DeleteAndRecreate,
    disable_fixup: Some(DisableFixup {
        field: "task-enabled",
        disabled_value: "false",
    }),
    alias_fields: &["idref", "task-path"],
    toggle_field: Some("task-enabled"),
};

/// Resource kinds the engine can reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Security users.
    User,
    /// Security roles.
    Role,
    /// Certificate templates.
    CertificateTemplate,
    /// Protected paths.
    ProtectedPath,
    /// Scheduled tasks.
    Task,
}

impl ResourceKind {
    /// Every kind, in table order.
    pub const ALL: [ResourceKind; 5] = [
        Self::User,
        Self::Role,
        Self::CertificateTemplate,
        Self::ProtectedPath,
        Self::Task,
    ];

    /// Returns the kind's static description.
    pub fn spec(self) -> &'static KindSpec {
        match self {
            Self::User => &USER,
            Self::Role => &ROLE,
            Self::CertificateTemplate => &CERTIFICATE_TEMPLATE,
            Self::ProtectedPath => &PROTECTED_PATH,
            Self::Task => &TASK,
        }
    }

    /// Returns the kind's short name.
    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted || format!("{}s", kind.name()) == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|k| k.name()).collect();
                format!("unknown resource kind '{s}'; expected one of {}", names.join(", "))
            })
    }
}

/// Paths of one kind, optionally scoped to a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    collection: &'static str,
    group: Option<String>,
}

impl ResourcePaths {
    /// Creates the paths for `spec`. The group is used only for group-scoped kinds.
    pub fn new(spec: &KindSpec, group: Option<&str>) -> Self {
        let group = spec
            .group_scoped
            .then(|| group.unwrap_or(DEFAULT_GROUP).to_string());
        Self {
            collection: spec.collection,
            group,
        }
    }

    /// Returns the group, for group-scoped kinds.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// `C` plus the group parameter.
    pub fn collection(&self) -> String {
        self.scoped(self.collection.to_string())
    }

    /// `C/<id>` plus the group parameter.
    pub fn resource(&self, id: &str) -> String {
        self.scoped(format!("{}/{id}", self.collection))
    }

    /// `C/<id>/properties` plus the group parameter.
    pub fn properties(&self, id: &str) -> String {
        self.scoped(format!("{}/{id}/properties", self.collection))
    }

    fn scoped(&self, path: String) -> String {
        match &self.group {
            Some(group) => append_param(&path, "group-id", group),
            None => path,
        }
    }
}

/// Appends `name=value` to `path`, starting the query string if needed.
pub fn append_param(path: &str, name: &str, value: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{name}={value}")
}
