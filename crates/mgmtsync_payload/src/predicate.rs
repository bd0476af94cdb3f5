//! Structural predicates over listing entries.

use crate::listing::ListingEntry;
use std::fmt;

/// An equality predicate over the named fields of a listing entry.
///
/// Predicates combine with AND ([`Predicate::all`]) and OR
/// ([`Predicate::any`]). An entry without the named field never satisfies an
/// equality test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The field equals the value.
    Eq {
        /// Field (child element local name) to compare.
        field: String,
        /// Expected value.
        value: String,
    },
    /// Every inner predicate holds. An empty conjunction is true.
    All(Vec<Predicate>),
    /// At least one inner predicate holds. An empty disjunction is false.
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Creates an equality test.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a conjunction.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Self::All(predicates.into_iter().collect())
    }

    /// Creates a disjunction.
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Self::Any(predicates.into_iter().collect())
    }

    /// Conjoins `other` with this predicate.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::All(mut inner) => {
                inner.push(other);
                Self::All(inner)
            }
            first => Self::All(vec![first, other]),
        }
    }

    /// Disjoins `other` with this predicate.
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Any(mut inner) => {
                inner.push(other);
                Self::Any(inner)
            }
            first => Self::Any(vec![first, other]),
        }
    }

    /// Returns true if `entry` satisfies the predicate.
    pub fn matches(&self, entry: &ListingEntry) -> bool {
        match self {
            Self::Eq { field, value } => entry.get(field) == Some(value.as_str()),
            Self::All(inner) => inner.iter().all(|p| p.matches(entry)),
            Self::Any(inner) => inner.iter().any(|p| p.matches(entry)),
        }
    }
}

/// Renders the predicate in an XPath-like form, e.g.
/// `task-path = '/a.xqy' and task-database = 'Documents'`.
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { field, value } => write!(f, "{field} = '{value}'"),
            Self::All(inner) => write_joined(f, inner, " and ", "true()"),
            Self::Any(inner) => write_joined(f, inner, " or ", "false()"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    inner: &[Predicate],
    separator: &str,
    empty: &str,
) -> fmt::Result {
    if inner.is_empty() {
        return f.write_str(empty);
    }
    for (i, predicate) in inner.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        match predicate {
            Predicate::Eq { .. } => write!(f, "{predicate}")?,
            _ => write!(f, "({predicate})")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(fields: &[(&str, &str)]) -> ListingEntry {
        ListingEntry::from_fields(fields.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn conjunction_requires_every_field() {
        let task = entry(&[("idref", "1"), ("task-path", "/a.xqy"), ("task-database", "Documents")]);
        let p = Predicate::eq("task-path", "/a.xqy").and(Predicate::eq("task-database", "Documents"));
        assert!(p.matches(&task));

        let p = Predicate::eq("task-path", "/a.xqy").and(Predicate::eq("task-database", "Modules"));
        assert!(!p.matches(&task));
    }

    #[test]
    fn missing_field_never_matches() {
        let task = entry(&[("idref", "1")]);
        assert!(!Predicate::eq("task-path", "").matches(&task));
    }

    #[test]
    fn disjunction_matches_either_side() {
        let task = entry(&[("idref", "17"), ("task-path", "/a.xqy")]);
        let by_id = Predicate::eq("task-path", "17").or(Predicate::eq("idref", "17"));
        assert!(by_id.matches(&task));
    }

    #[test]
    fn display_is_xpath_like() {
        let p = Predicate::eq("task-path", "/a.xqy")
            .and(Predicate::eq("task-database", "Documents"))
            .and(Predicate::eq("idref", "1").or(Predicate::eq("nameref", "x")));
        assert_eq!(
            p.to_string(),
            "task-path = '/a.xqy' and task-database = 'Documents' and (idref = '1' or nameref = 'x')"
        );
        assert_eq!(Predicate::all([]).to_string(), "true()");
    }

    proptest! {
        #[test]
        fn empty_combinators_are_identities(value in "[a-z]{0,6}") {
            let e = entry(&[("f", value.as_str())]);
            prop_assert!(Predicate::all([]).matches(&e));
            prop_assert!(!Predicate::any([]).matches(&e));
            prop_assert!(Predicate::all([Predicate::eq("f", value.clone())]).matches(&e));
        }
    }
}
