//! Request and response types and the HTTP client abstraction.

use crate::error::TransportResult;
use mgmtsync_payload::PayloadFormat;
use std::fmt;

/// HTTP methods used by the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// PUT
    Put,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// `application/json`
    Json,
    /// `application/xml`
    Xml,
    /// `text/plain`
    Text,
}

impl ContentType {
    /// Returns the MIME type.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::Text => "text/plain",
        }
    }

    /// Returns a short label for log messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Text => "text",
        }
    }
}

impl From<PayloadFormat> for ContentType {
    fn from(format: PayloadFormat) -> Self {
        match format {
            PayloadFormat::Json => Self::Json,
            PayloadFormat::Xml => Self::Xml,
        }
    }
}

/// A request against the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManageRequest {
    /// Method.
    pub method: HttpMethod,
    /// Path relative to the base URL, including any query string.
    pub path: String,
    /// Request body.
    pub body: Option<String>,
    /// Content type of the body.
    pub content_type: Option<ContentType>,
    /// Requested response type.
    pub accept: Option<ContentType>,
}

impl ManageRequest {
    /// Creates a request without a body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            content_type: None,
            accept: None,
        }
    }

    /// Sets the body and its content type.
    pub fn with_body(mut self, body: impl Into<String>, content_type: ContentType) -> Self {
        self.body = Some(body.into());
        self.content_type = Some(content_type);
        self
    }

    /// Sets the `Accept` type.
    pub fn with_accept(mut self, accept: ContentType) -> Self {
        self.accept = Some(accept);
        self
    }
}

/// A response from the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManageResponse {
    status: u16,
    body: String,
    location: Option<String>,
}

impl ManageResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            location: None,
        }
    }

    /// Sets the `Location` header.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Returns the status code.
    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// Returns the body text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the `Location` header.
    pub fn location_header(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the last non-empty path segment of the `Location` header.
    ///
    /// For `/manage/v2/tasks/17007?group-id=Default` this is `17007`.
    pub fn location_id(&self) -> Option<&str> {
        let location = self.location.as_deref()?;
        let path = location.split(['?', '#']).next().unwrap_or(location);
        path.rsplit('/').find(|segment| !segment.is_empty())
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Real channels
/// speak HTTP; tests plug in in-memory servers.
pub trait HttpClient: Send + Sync {
    /// Executes a request and returns the response, whatever its status.
    fn execute(&self, request: &ManageRequest) -> TransportResult<ManageResponse>;
}
