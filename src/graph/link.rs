//! Typed links and edge keys

use super::predicate::PredicateSpec;
use super::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed link from some entity to `other`
///
/// `is_source` is true when the entity owning the link list is the subject
/// of the underlying edge. Indexing from the other end means calling
/// [`Link::flipped`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub other: String,
    pub predicate: PredicateSpec,
    pub is_source: bool,
}

impl Link {
    pub fn new(other: impl Into<String>, predicate: PredicateSpec, is_source: bool) -> Self {
        Self {
            other: other.into(),
            predicate,
            is_source,
        }
    }

    /// Same edge seen from `other`'s side
    pub fn flipped(&self, owner: impl Into<String>) -> Self {
        Self {
            other: owner.into(),
            predicate: self.predicate.clone(),
            is_source: !self.is_source,
        }
    }

    /// Edge key for this link when it belongs to `owner`
    pub fn edge_key(&self, owner: &str) -> EdgeKey {
        if self.is_source {
            EdgeKey::new(owner, self.predicate.clone(), &self.other)
        } else {
            EdgeKey::new(&self.other, self.predicate.clone(), owner)
        }
    }
}

/// `"<subject> <predicate_spec_json> <object>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub subject: String,
    pub predicate: PredicateSpec,
    pub object: String,
}

impl EdgeKey {
    pub fn new(subject: impl Into<String>, predicate: PredicateSpec, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
        }
    }

    /// Subject and object swapped, predicate untouched
    pub fn reversed(&self) -> Self {
        Self {
            subject: self.object.clone(),
            predicate: self.predicate.clone(),
            object: self.subject.clone(),
        }
    }

    pub fn parse(key: &str) -> Result<Self, ParseError> {
        let (subject, json, object) = split_key(key)?;
        Ok(Self::new(subject, PredicateSpec::parse(json)?, object))
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate.canonical_json(), self.object)
    }
}

/// Swap subject and object of a raw edge key, leaving the JSON blob byte-identical
pub fn reverse_key(key: &str) -> Result<String, ParseError> {
    let (subject, json, object) = split_key(key)?;
    Ok(format!("{} {} {}", object, json, subject))
}

fn split_key(key: &str) -> Result<(&str, &str, &str), ParseError> {
    let bad = || ParseError::EdgeKey(key.to_string());
    let (subject, rest) = key.split_once(' ').ok_or_else(bad)?;
    let (json, object) = rest.rsplit_once(' ').ok_or_else(bad)?;
    if subject.is_empty() || object.is_empty() || !json.starts_with('{') || !json.ends_with('}') {
        return Err(bad());
    }
    Ok((subject, json, object))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treats() -> PredicateSpec {
        PredicateSpec::new("biolink:treats")
    }

    #[test]
    fn edge_key_formats_with_single_spaces() {
        let key = EdgeKey::new("CHEBI:1", treats(), "MONDO:2");
        assert_eq!(key.to_string(), r#"CHEBI:1 {"predicate": "biolink:treats"} MONDO:2"#);
    }

    #[test]
    fn reverse_key_keeps_json_blob() {
        let key = r#"A {"object_aspect_qualifier": "activity", "predicate": "biolink:affects"} B"#;
        let reversed = reverse_key(key).unwrap();
        assert_eq!(
            reversed,
            r#"B {"object_aspect_qualifier": "activity", "predicate": "biolink:affects"} A"#
        );
        assert_eq!(reverse_key(&reversed).unwrap(), key);
    }

    #[test]
    fn reverse_key_rejects_garbage() {
        assert!(reverse_key("no-spaces").is_err());
        assert!(reverse_key("A not-json B").is_err());
    }

    #[test]
    fn parse_round_trips_display() {
        let key = EdgeKey::new("NCBIGene:1", treats().with_qualifier("species_context_qualifier", "NCBITaxon:9606"), "MONDO:5");
        let parsed = EdgeKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.reversed().reversed(), key);
    }

    #[test]
    fn link_edge_key_respects_orientation() {
        let outgoing = Link::new("MONDO:5", treats(), true);
        assert_eq!(outgoing.edge_key("CHEBI:1").subject, "CHEBI:1");

        let incoming = Link::new("CHEBI:1", treats(), false);
        let key = incoming.edge_key("MONDO:5");
        assert_eq!(key.subject, "CHEBI:1");
        assert_eq!(key.object, "MONDO:5");
    }

    #[test]
    fn flipped_link_inverts_orientation() {
        let link = Link::new("GO:1", treats(), true);
        let back = link.flipped("NCBIGene:7");
        assert_eq!(back.other, "NCBIGene:7");
        assert!(!back.is_source);
        assert_eq!(back.edge_key("GO:1"), link.edge_key("NCBIGene:7"));
    }
}
