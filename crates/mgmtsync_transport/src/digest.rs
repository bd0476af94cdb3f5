//! HTTP digest authentication (RFC 2617, RFC 7616 MD5 variants).
//!
//! A [`DigestCache`] remembers the last challenge per realm so later requests
//! can authenticate preemptively with an incrementing nonce count.

use crate::error::{TransportError, TransportResult};
use md5::{Digest, Md5};
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Digest hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// `MD5`
    Md5,
    /// `MD5-sess`
    Md5Sess,
}

impl DigestAlgorithm {
    fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
        }
    }
}

/// A parsed `WWW-Authenticate: Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    /// Protection realm.
    pub realm: String,
    /// Server nonce.
    pub nonce: String,
    /// Opaque value echoed back to the server.
    pub opaque: Option<String>,
    /// Hash algorithm.
    pub algorithm: DigestAlgorithm,
    /// Whether `qop=auth` is used.
    pub qop_auth: bool,
    /// Whether the previous nonce was rejected as stale.
    pub stale: bool,
}

impl DigestChallenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// Returns `Ok(None)` when the header is not a digest challenge.
    pub fn parse(header: &str) -> TransportResult<Option<Self>> {
        let header = header.trim();
        let Some((scheme, rest)) = header.split_once(char::is_whitespace) else {
            return Ok(None);
        };
        if !scheme.eq_ignore_ascii_case("digest") {
            return Ok(None);
        }

        let params = parse_params(rest)?;
        let get = |key: &str| params.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());

        let realm = get("realm")
            .ok_or_else(|| TransportError::InvalidChallenge("missing realm".into()))?;
        let nonce = get("nonce")
            .ok_or_else(|| TransportError::InvalidChallenge("missing nonce".into()))?;

        let algorithm = match get("algorithm") {
            None => DigestAlgorithm::Md5,
            Some(a) if a.eq_ignore_ascii_case("md5") => DigestAlgorithm::Md5,
            Some(a) if a.eq_ignore_ascii_case("md5-sess") => DigestAlgorithm::Md5Sess,
            Some(other) => {
                return Err(TransportError::InvalidChallenge(format!(
                    "algorithm {other}"
                )))
            }
        };

        let qop_auth = match get("qop") {
            None => false,
            Some(qop) => {
                if qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")) {
                    true
                } else {
                    return Err(TransportError::InvalidChallenge(format!("qop {qop}")));
                }
            }
        };

        let stale = get("stale").is_some_and(|s| s.eq_ignore_ascii_case("true"));

        Ok(Some(Self {
            realm,
            nonce,
            opaque: get("opaque"),
            algorithm,
            qop_auth,
            stale,
        }))
    }

    /// Computes the `Authorization` header value for one request.
    pub fn authorization(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        nonce_count: u32,
        cnonce: &str,
    ) -> String {
        let nc = format!("{nonce_count:08x}");
        let mut ha1 = md5_hex(&format!("{username}:{}:{password}", self.realm));
        if self.algorithm == DigestAlgorithm::Md5Sess {
            ha1 = md5_hex(&format!("{ha1}:{}:{cnonce}", self.nonce));
        }
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        let response = if self.qop_auth {
            md5_hex(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce))
        } else {
            md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce))
        };

        let mut header = format!(
            "Digest username=\"{username}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", algorithm={}, response=\"{response}\"",
            self.realm,
            self.nonce,
            self.algorithm.as_str()
        );
        if self.qop_auth {
            let _ = write!(header, ", qop=auth, nc={nc}, cnonce=\"{cnonce}\"");
        }
        if let Some(opaque) = &self.opaque {
            let _ = write!(header, ", opaque=\"{opaque}\"");
        }
        header
    }
}

/// Per-channel cache of digest challenges.
///
/// Challenges are stored by realm; each authority remembers the realm that
/// last challenged it.
#[derive(Debug, Default)]
pub struct DigestCache {
    realms: RwLock<HashMap<String, Arc<CachedChallenge>>>,
    authorities: RwLock<HashMap<String, String>>,
}

#[derive(Debug)]
struct CachedChallenge {
    challenge: DigestChallenge,
    nonce_count: AtomicU32,
}

impl DigestCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a challenge received from `authority`, resetting its nonce
    /// count.
    pub fn store(&self, authority: &str, challenge: DigestChallenge) {
        let realm = challenge.realm.clone();
        let entry = Arc::new(CachedChallenge {
            challenge,
            nonce_count: AtomicU32::new(0),
        });
        self.realms.write().insert(realm.clone(), entry);
        self.authorities.write().insert(authority.to_string(), realm);
    }

    /// Returns the cached challenge for `authority` and the next nonce count.
    pub fn next(&self, authority: &str) -> Option<(DigestChallenge, u32)> {
        let realm = self.authorities.read().get(authority).cloned()?;
        let entry = self.realms.read().get(&realm).cloned()?;
        let nc = entry.nonce_count.fetch_add(1, Ordering::SeqCst) + 1;
        Some((entry.challenge.clone(), nc))
    }

    /// Forgets the challenge for `authority`.
    pub fn clear(&self, authority: &str) {
        if let Some(realm) = self.authorities.write().remove(authority) {
            self.realms.write().remove(&realm);
        }
    }

    /// Returns true if a challenge is cached for `authority`.
    pub fn contains(&self, authority: &str) -> bool {
        self.authorities.read().contains_key(authority)
    }
}

/// Generates a random client nonce.
pub fn client_nonce() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    hex(&bytes)
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Splits `key=value, key="quoted, value"` into pairs with lowercase keys.
fn parse_params(input: &str) -> TransportResult<Vec<(String, String)>> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(TransportError::InvalidChallenge(format!(
                "parameter '{}' has no value",
                key.trim()
            )));
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            if !closed {
                return Err(TransportError::InvalidChallenge(
                    "unterminated quoted string".into(),
                ));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        params.push((key.trim().to_ascii_lowercase(), value));
    }

    Ok(params)
}
