//! Authenticated HTTP channel backed by a blocking `reqwest` client.

use crate::config::ManageConfig;
use crate::digest::{client_nonce, DigestCache, DigestChallenge};
use crate::error::{TransportError, TransportResult};
use crate::http::{HttpClient, HttpMethod, ManageRequest, ManageResponse};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use reqwest::Method;
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

/// One authenticated connection to the management API.
///
/// Each channel owns its own digest cache, so the operating and elevated
/// identities never share credentials.
pub struct AuthenticatedChannel {
    base_url: String,
    authority: String,
    username: String,
    password: Zeroizing<String>,
    client: Client,
    digest: DigestCache,
}

struct RawResponse {
    status: u16,
    location: Option<String>,
    challenges: Vec<String>,
    body: String,
}

impl AuthenticatedChannel {
    /// Creates a channel for the given identity.
    pub fn new(config: &ManageConfig, username: &str, password: &str) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.configure_simple_ssl)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url(),
            authority: format!("{}:{}", config.host, config.port),
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
            client,
            digest: DigestCache::new(),
        })
    }

    /// Returns the username this channel authenticates as.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Builds the full URL for `path`. Spaces in the path become `+`.
    pub fn url_for(&self, path: &str) -> TransportResult<Url> {
        let path = path.replace(' ', "+");
        let full = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&full).map_err(|e| TransportError::InvalidUrl(format!("{full}: {e}")))
    }

    fn authorization(&self, method: HttpMethod, uri: &str) -> Option<String> {
        let (challenge, nc) = self.digest.next(&self.authority)?;
        Some(challenge.authorization(
            &self.username,
            &self.password,
            method.as_str(),
            uri,
            nc,
            &client_nonce(),
        ))
    }

    fn send(
        &self,
        request: &ManageRequest,
        url: &Url,
        authorization: Option<&str>,
    ) -> TransportResult<RawResponse> {
        let mut builder = self.client.request(to_reqwest(request.method), url.clone());
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type.mime());
        }
        if let Some(accept) = request.accept {
            builder = builder.header(ACCEPT, accept.mime());
        }
        if let Some(auth) = authorization {
            builder = builder.header(AUTHORIZATION, auth);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| TransportError::io(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers();
        let location = headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let challenges = headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = response
            .text()
            .map_err(|e| TransportError::io(e.to_string()))?;

        Ok(RawResponse {
            status,
            location,
            challenges,
            body,
        })
    }
}

impl HttpClient for AuthenticatedChannel {
    fn execute(&self, request: &ManageRequest) -> TransportResult<ManageResponse> {
        let url = self.url_for(&request.path)?;
        let uri = request_uri(&url);

        let preemptive = self.authorization(request.method, &uri);
        let mut raw = self.send(request, &url, preemptive.as_deref())?;

        if raw.status == 401 {
            if let Some(challenge) = first_digest_challenge(&raw.challenges)? {
                debug!(
                    "Digest challenge from realm '{}' (stale: {})",
                    challenge.realm, challenge.stale
                );
                self.digest.store(&self.authority, challenge);
                let retry = self.authorization(request.method, &uri);
                raw = self.send(request, &url, retry.as_deref())?;
            }
        }

        let response = ManageResponse::new(raw.status, raw.body);
        Ok(match raw.location {
            Some(location) => response.with_location(location),
            None => response,
        })
    }
}

fn first_digest_challenge(headers: &[String]) -> TransportResult<Option<DigestChallenge>> {
    for header in headers {
        if let Some(challenge) = DigestChallenge::parse(header)? {
            return Ok(Some(challenge));
        }
    }
    Ok(None)
}

/// Returns the request target (path and query) as sent on the wire.
fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Post => Method::POST,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> AuthenticatedChannel {
        let config = ManageConfig::new("ml-host").with_port(8002);
        AuthenticatedChannel::new(&config, "admin", "admin").unwrap()
    }

    #[test]
    fn spaces_in_paths_become_plus() {
        let url = channel().url_for("/manage/v2/roles/my role/properties").unwrap();
        assert_eq!(
            url.as_str(),
            "http://ml-host:8002/manage/v2/roles/my+role/properties"
        );
    }

    #[test]
    fn query_is_part_of_request_uri() {
        let url = channel()
            .url_for("/manage/v2/tasks?group-id=Default")
            .unwrap();
        assert_eq!(request_uri(&url), "/manage/v2/tasks?group-id=Default");
    }

    #[test]
    fn relative_paths_are_rooted() {
        let url = channel().url_for("manage/v2").unwrap();
        assert_eq!(url.path(), "/manage/v2");
    }

    #[test]
    fn picks_digest_among_challenges() {
        let headers = vec![
            r#"Basic realm="public""#.to_string(),
            r#"Digest realm="public", nonce="n1", qop="auth""#.to_string(),
        ];
        let challenge = first_digest_challenge(&headers).unwrap().unwrap();
        assert_eq!(challenge.nonce, "n1");
    }
}
