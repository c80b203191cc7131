//! Canonical predicate + qualifier specification
//!
//! A `PredicateSpec` is the value type behind the JSON blobs the lookup
//! service uses as keys: `{"object_aspect_qualifier": "activity", "predicate": "biolink:affects"}`.
//! The serialized form sorts keys lexicographically and uses `", "` / `": "`
//! separators, and must be reproduced byte for byte to hit the store.

use super::ParseError;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;

/// Key holding the predicate inside the canonical JSON object
pub const PREDICATE_KEY: &str = "predicate";

/// Namespace prefix for biolink predicates and qualifier types
pub const BIOLINK_PREFIX: &str = "biolink:";

/// A predicate plus its qualifiers, ordered by key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredicateSpec {
    predicate: String,
    qualifiers: BTreeMap<String, String>,
}

impl PredicateSpec {
    /// Create an unqualified predicate spec
    pub fn new(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            qualifiers: BTreeMap::new(),
        }
    }

    /// Add a qualifier (key without the biolink prefix, e.g. `object_aspect_qualifier`)
    pub fn with_qualifier(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.qualifiers.insert(key.into(), value.into());
        self
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn qualifiers(&self) -> &BTreeMap<String, String> {
        &self.qualifiers
    }

    pub fn has_qualifiers(&self) -> bool {
        !self.qualifiers.is_empty()
    }

    /// True for the `related_to` family, whose counts are tallied in both orientations
    pub fn is_related_to(&self) -> bool {
        self.predicate.contains("related_to")
    }

    /// Qualifiers as `(namespaced type id, value)` pairs, e.g. `("biolink:object_aspect_qualifier", "activity")`
    pub fn namespaced_qualifiers(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.qualifiers
            .iter()
            .map(|(k, v)| (namespaced(k), v.as_str()))
    }

    /// Canonical serialization used for store keys and edge keys
    pub fn canonical_json(&self) -> String {
        let mut out = Vec::with_capacity(64);
        let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
        // Writing string pairs into a Vec cannot fail
        if self.serialize(&mut ser).is_err() {
            return String::new();
        }
        String::from_utf8(out).unwrap_or_default()
    }

    /// Parse a predicate spec from its JSON object form
    pub fn parse(json: &str) -> Result<Self, ParseError> {
        serde_json::from_str(json).map_err(|e| ParseError::PredicateSpec(format!("{}: {}", json, e)))
    }
}

impl fmt::Display for PredicateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_json())
    }
}

impl std::str::FromStr for PredicateSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Prefix a bare qualifier key with the biolink namespace
pub fn namespaced(key: &str) -> String {
    if key.starts_with(BIOLINK_PREFIX) {
        key.to_string()
    } else {
        format!("{}{}", BIOLINK_PREFIX, key)
    }
}

/// Strip the biolink namespace from a qualifier type id
pub fn bare(key: &str) -> &str {
    key.strip_prefix(BIOLINK_PREFIX).unwrap_or(key)
}

impl Serialize for PredicateSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // "predicate" participates in the key ordering like any qualifier
        let mut entries: BTreeMap<&str, &str> = self
            .qualifiers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.insert(PREDICATE_KEY, self.predicate.as_str());

        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (k, v) in entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PredicateSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = PredicateSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object with a string \"predicate\" and string qualifiers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut predicate = None;
                let mut qualifiers = BTreeMap::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    if key == PREDICATE_KEY {
                        predicate = Some(value);
                    } else {
                        qualifiers.insert(key, value);
                    }
                }
                let predicate = predicate.ok_or_else(|| de::Error::missing_field(PREDICATE_KEY))?;
                Ok(PredicateSpec { predicate, qualifiers })
            }
        }

        deserializer.deserialize_map(SpecVisitor)
    }
}

/// JSON formatter with `", "` and `": "` separators, escaping non-ASCII
/// characters as `\uXXXX` (surrogate pairs above the BMP)
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
