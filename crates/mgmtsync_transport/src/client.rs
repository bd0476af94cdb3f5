//! The management API client with operating and elevated channels.

use crate::channel::AuthenticatedChannel;
use crate::config::ManageConfig;
use crate::error::TransportResult;
use crate::http::{ContentType, HttpClient, HttpMethod, ManageRequest, ManageResponse};
use mgmtsync_payload::Payload;
use std::sync::Arc;
use tracing::info;

/// Client for the management REST API.
///
/// Requests go through the primary channel unless they ask to run as the
/// elevated identity. The secondary channel is distinct only when the
/// configuration names a separate security user; otherwise both names refer
/// to the same channel.
#[derive(Clone)]
pub struct ManageClient {
    config: ManageConfig,
    primary: Arc<dyn HttpClient>,
    secondary: Arc<dyn HttpClient>,
    separate_elevated: bool,
}

impl ManageClient {
    /// Connects over HTTP using the configured identities.
    pub fn connect(config: ManageConfig) -> TransportResult<Self> {
        let primary: Arc<dyn HttpClient> = Arc::new(AuthenticatedChannel::new(
            &config,
            &config.username,
            config.password(),
        )?);

        let secondary: Option<Arc<dyn HttpClient>> = match (
            config.has_elevated_identity(),
            &config.security_username,
        ) {
            (true, Some(username)) => Some(Arc::new(AuthenticatedChannel::new(
                &config,
                username,
                config.security_password().unwrap_or_default(),
            )?)),
            _ => None,
        };

        Ok(Self::with_channels(config, primary, secondary))
    }

    /// Creates a client over existing channels.
    ///
    /// When `secondary` is `None`, elevated requests use the primary channel.
    pub fn with_channels(
        config: ManageConfig,
        primary: Arc<dyn HttpClient>,
        secondary: Option<Arc<dyn HttpClient>>,
    ) -> Self {
        let separate_elevated = secondary.is_some();
        let secondary = secondary.unwrap_or_else(|| Arc::clone(&primary));
        Self {
            config,
            primary,
            secondary,
            separate_elevated,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ManageConfig {
        &self.config
    }

    /// Returns true if elevated requests use their own channel.
    pub fn has_separate_elevated_channel(&self) -> bool {
        self.separate_elevated
    }

    /// Sends a request and returns the response, whatever its status.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&str>,
        content_type: Option<ContentType>,
        as_elevated: bool,
    ) -> TransportResult<ManageResponse> {
        let mut request = ManageRequest::new(method, path);
        if let (Some(body), Some(content_type)) = (body, content_type) {
            request = request.with_body(body, content_type);
        } else if let Some(body) = body {
            request.body = Some(body.to_string());
        }
        self.execute(request, as_elevated)
    }

    /// Fetches `path` as JSON.
    pub fn get_json(&self, path: &str, as_elevated: bool) -> TransportResult<ManageResponse> {
        self.execute(
            ManageRequest::new(HttpMethod::Get, path).with_accept(ContentType::Json),
            as_elevated,
        )
    }

    /// Fetches `path` as XML.
    pub fn get_xml(&self, path: &str, as_elevated: bool) -> TransportResult<ManageResponse> {
        self.execute(
            ManageRequest::new(HttpMethod::Get, path).with_accept(ContentType::Xml),
            as_elevated,
        )
    }

    /// POSTs a payload with the content type of its format.
    pub fn post_payload(
        &self,
        path: &str,
        payload: &Payload,
        as_elevated: bool,
    ) -> TransportResult<ManageResponse> {
        self.send_payload(HttpMethod::Post, path, payload, as_elevated)
    }

    /// PUTs a payload with the content type of its format.
    pub fn put_payload(
        &self,
        path: &str,
        payload: &Payload,
        as_elevated: bool,
    ) -> TransportResult<ManageResponse> {
        self.send_payload(HttpMethod::Put, path, payload, as_elevated)
    }

    /// POSTs a plain text body.
    pub fn post_text(&self, path: &str, text: &str, as_elevated: bool) -> TransportResult<ManageResponse> {
        self.execute(
            ManageRequest::new(HttpMethod::Post, path).with_body(text, ContentType::Text),
            as_elevated,
        )
    }

    /// Sends a DELETE.
    pub fn delete(&self, path: &str, as_elevated: bool) -> TransportResult<ManageResponse> {
        self.execute(ManageRequest::new(HttpMethod::Delete, path), as_elevated)
    }

    fn send_payload(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &Payload,
        as_elevated: bool,
    ) -> TransportResult<ManageResponse> {
        let body = if self.config.clean_json_payloads && payload.is_json() {
            payload.sanitize_json_comments()?
        } else {
            payload.clone()
        };
        self.execute(
            ManageRequest::new(method, path).with_body(body.as_str(), body.format().into()),
            as_elevated,
        )
    }

    fn execute(&self, request: ManageRequest, as_elevated: bool) -> TransportResult<ManageResponse> {
        let label = request.content_type.or(request.accept).map(ContentType::label);
        let kind = match label {
            Some(label) => format!("{label} {}", request.method),
            None => request.method.to_string(),
        };

        if as_elevated && self.separate_elevated {
            info!(
                "Sending {} request as user '{}' (who should have the 'manage-admin' and 'security' roles) to path: {}",
                kind,
                self.config.acting_username(true),
                request.path
            );
            self.secondary.execute(&request)
        } else {
            info!(
                "Sending {} request as user '{}' to path: {}",
                kind, self.config.username, request.path
            );
            self.primary.execute(&request)
        }
    }
}
