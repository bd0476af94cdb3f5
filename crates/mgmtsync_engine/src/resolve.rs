//! Identity resolution.
//!
//! Resolution runs against an explicit listing snapshot so it can be tested
//! without a server. Only tie-breaking between several matches needs more
//! data, which [`disambiguate`] obtains through a caller-supplied fetch.

use crate::error::{ReconcileError, ReconcileResult};
use crate::kind::{IdentitySource, KindSpec, ResourceKind};
use mgmtsync_payload::{ListingDocument, Payload, Predicate};
use tracing::{debug, warn};

/// Outcome of resolving a payload against a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The payload describes this existing resource.
    Existing(String),
    /// No existing resource matches. `key` is the identity the payload named,
    /// if it named one.
    Absent {
        /// Identity named by the payload.
        key: Option<String>,
    },
    /// Several resources match the secondary keys.
    Ambiguous {
        /// Identities of the matches, in listing order.
        candidates: Vec<String>,
    },
}

/// Resolves which existing resource, if any, `payload` describes.
pub fn resolve_identity(
    kind: ResourceKind,
    payload: &Payload,
    listing: &ListingDocument,
) -> ReconcileResult<Resolution> {
    let spec = kind.spec();

    if let Some(id) = payload.field(spec.identity_field)? {
        let known = Predicate::eq("idref", id.as_str()).or(Predicate::eq("nameref", id.as_str()));
        return Ok(if listing.any_match(&known) {
            debug!("{} '{}' exists", spec.name, id);
            Resolution::Existing(id)
        } else {
            debug!("{} '{}' does not exist", spec.name, id);
            Resolution::Absent { key: Some(id) }
        });
    }

    match spec.identity {
        IdentitySource::Natural => {
            let id = payload.required_field(spec.identity_field)?;
            Ok(Resolution::Absent { key: Some(id) })
        }
        IdentitySource::ServerGenerated { .. } => {
            let predicate = secondary_predicate(spec, payload)?;
            let mut ids = listing.matching_id_refs(&predicate);
            debug!("{} {} match [{}]", ids.len(), spec.name, predicate);
            Ok(match ids.len() {
                0 => Resolution::Absent { key: None },
                1 => Resolution::Existing(ids.remove(0)),
                _ => Resolution::Ambiguous { candidates: ids },
            })
        }
    }
}

/// Builds the conjunction of the secondary keys present in `payload`.
///
/// Required keys must be present. Values are trimmed, as listing text is.
pub fn secondary_predicate(spec: &KindSpec, payload: &Payload) -> ReconcileResult<Predicate> {
    let IdentitySource::ServerGenerated { secondary, .. } = spec.identity else {
        return Ok(Predicate::eq("nameref", payload.required_field(spec.identity_field)?));
    };

    let mut terms = Vec::with_capacity(secondary.len());
    for key in secondary {
        let value = if key.required {
            Some(payload.required_field(key.payload_field)?)
        } else {
            payload.field(key.payload_field)?
        };
        if let Some(value) = value {
            terms.push(Predicate::eq(key.listing_field, value.trim()));
        }
    }
    Ok(Predicate::all(terms))
}

/// Picks the candidate whose tertiary field equals the payload's.
///
/// `fetch_properties` returns a candidate's current properties. Returns
/// `Ok(None)` when no candidate matches, which callers treat as a new
/// resource.
pub fn disambiguate<F>(
    kind: ResourceKind,
    payload: &Payload,
    candidates: &[String],
    mut fetch_properties: F,
) -> ReconcileResult<Option<String>>
where
    F: FnMut(&str) -> ReconcileResult<Payload>,
{
    let spec = kind.spec();
    let ambiguous = || -> ReconcileResult<ReconcileError> {
        Ok(ReconcileError::AmbiguousResourceMatch {
            kind: spec.name,
            key: secondary_predicate(spec, payload)?.to_string(),
            candidates: candidates.to_vec(),
        })
    };

    let IdentitySource::ServerGenerated {
        tertiary: Some(tertiary),
        ..
    } = spec.identity
    else {
        return Err(ambiguous()?);
    };
    let Some(wanted) = payload.field(tertiary)? else {
        return Err(ambiguous()?);
    };
    let wanted = wanted.trim();

    for candidate in candidates {
        let properties = fetch_properties(candidate)?;
        if properties.field(tertiary)?.as_deref().map(str::trim) == Some(wanted) {
            debug!("{} '{}' has {} '{}'", spec.name, candidate, tertiary, wanted);
            return Ok(Some(candidate.clone()));
        }
    }

    warn!(
        "None of the existing {} resources {:?} has {} '{}'; creating a new one",
        spec.name, candidates, tertiary, wanted
    );
    Ok(None)
}
