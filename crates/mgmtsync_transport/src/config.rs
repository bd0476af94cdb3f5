//! Connection configuration for the management API.

use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Default management API port.
pub const DEFAULT_PORT: u16 = 8002;

/// Configuration for connecting to the management API.
#[derive(Clone)]
pub struct ManageConfig {
    /// URL scheme (`http` or `https`).
    pub scheme: String,
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Operating username.
    pub username: String,
    password: Zeroizing<String>,
    /// Username for requests that need security privileges.
    pub security_username: Option<String>,
    security_password: Option<Zeroizing<String>>,
    /// Strip comments from JSON payloads before sending them.
    pub clean_json_payloads: bool,
    /// Accept any server certificate.
    pub configure_simple_ssl: bool,
    /// Request timeout.
    pub timeout: Duration,
}

impl ManageConfig {
    /// Creates a configuration for `host` with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            scheme: "http".to_string(),
            host: host.into(),
            port: DEFAULT_PORT,
            username: "admin".to_string(),
            password: Zeroizing::new("admin".to_string()),
            security_username: None,
            security_password: None,
            clean_json_payloads: false,
            configure_simple_ssl: false,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the URL scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the operating credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = Zeroizing::new(password.into());
        self
    }

    /// Sets the credentials used for requests that need security privileges.
    pub fn with_security_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.security_username = Some(username.into());
        self.security_password = Some(Zeroizing::new(password.into()));
        self
    }

    /// Enables or disables JSON comment stripping.
    pub fn with_clean_json_payloads(mut self, clean: bool) -> Self {
        self.clean_json_payloads = clean;
        self
    }

    /// Enables or disables accepting any server certificate.
    pub fn with_simple_ssl(mut self, simple: bool) -> Self {
        self.configure_simple_ssl = simple;
        if simple && self.scheme == "http" {
            self.scheme = "https".to_string();
        }
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the operating password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the security password, if one is configured.
    pub fn security_password(&self) -> Option<&str> {
        self.security_password.as_ref().map(|p| p.as_str())
    }

    /// Returns `scheme://host:port`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Returns true when a distinct elevated identity is configured.
    ///
    /// The security username must be set, non-blank, and different from the
    /// operating username.
    pub fn has_elevated_identity(&self) -> bool {
        match &self.security_username {
            Some(name) => !name.trim().is_empty() && *name != self.username,
            None => false,
        }
    }

    /// Returns the username that acts for a request.
    pub fn acting_username(&self, as_elevated: bool) -> &str {
        match (&self.security_username, as_elevated && self.has_elevated_identity()) {
            (Some(name), true) => name,
            _ => &self.username,
        }
    }
}

impl Default for ManageConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl fmt::Debug for ManageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManageConfig")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security_username", &self.security_username)
            .field(
                "security_password",
                &self.security_password.as_ref().map(|_| "<redacted>"),
            )
            .field("clean_json_payloads", &self.clean_json_payloads)
            .field("configure_simple_ssl", &self.configure_simple_ssl)
            .field("timeout", &self.timeout)
            .finish()
    }
}
