//! In-memory stores, used for fixtures and tests

use super::traits::{LookupStore, PropertyStore, ProvenanceRecord, StorageResult};
use crate::graph::{EdgeKey, Link, PredicateSpec};
use std::collections::{BTreeSet, HashMap};

type CountKey = (String, String, bool, String);

/// Hash-map backed [`LookupStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryLookupStore {
    links: HashMap<String, Vec<Link>>,
    types: HashMap<String, Vec<String>>,
    names: HashMap<String, String>,
    counts: HashMap<CountKey, u64>,
    populations: HashMap<String, f64>,
    provenance: HashMap<String, Vec<ProvenanceRecord>>,
}

impl MemoryLookupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an edge on both endpoints' link lists
    pub fn add_edge(&mut self, subject: &str, predicate: PredicateSpec, object: &str) {
        self.links
            .entry(subject.to_string())
            .or_default()
            .push(Link::new(object, predicate.clone(), true));
        self.links
            .entry(object.to_string())
            .or_default()
            .push(Link::new(subject, predicate, false));
    }

    pub fn add_link(&mut self, entity: &str, link: Link) {
        self.links.entry(entity.to_string()).or_default().push(link);
    }

    pub fn set_types(&mut self, entity: &str, types: &[&str]) {
        self.types
            .insert(entity.to_string(), types.iter().map(|t| t.to_string()).collect());
    }

    pub fn set_name(&mut self, entity: &str, name: &str) {
        self.names.insert(entity.to_string(), name.to_string());
    }

    pub fn set_count(&mut self, entity: &str, predicate: &PredicateSpec, is_source: bool, semantic_type: &str, count: u64) {
        self.counts.insert(
            (entity.to_string(), predicate.canonical_json(), is_source, semantic_type.to_string()),
            count,
        );
    }

    pub fn set_population(&mut self, semantic_type: &str, count: f64) {
        self.populations.insert(semantic_type.to_string(), count);
    }

    pub fn set_provenance(&mut self, key: &EdgeKey, records: Vec<ProvenanceRecord>) {
        self.provenance.insert(key.to_string(), records);
    }
}

impl LookupStore for MemoryLookupStore {
    fn get_links(&self, entity: &str) -> StorageResult<Vec<Link>> {
        Ok(self.links.get(entity).cloned().unwrap_or_default())
    }

    fn get_types(&self, entity: &str) -> StorageResult<Vec<String>> {
        Ok(self.types.get(entity).cloned().unwrap_or_default())
    }

    fn get_name(&self, entity: &str) -> StorageResult<Option<String>> {
        Ok(self.names.get(entity).cloned())
    }

    fn get_count(
        &self,
        entity: &str,
        predicate: &PredicateSpec,
        is_source: bool,
        semantic_type: &str,
    ) -> StorageResult<Option<u64>> {
        let key = (entity.to_string(), predicate.canonical_json(), is_source, semantic_type.to_string());
        Ok(self.counts.get(&key).copied())
    }

    fn get_population(&self, semantic_type: &str) -> StorageResult<Option<f64>> {
        Ok(self.populations.get(semantic_type).copied())
    }

    fn get_provenance(&self, edge_key: &str) -> StorageResult<Option<Vec<ProvenanceRecord>>> {
        Ok(self.provenance.get(edge_key).cloned())
    }
}

/// Hash-map backed [`PropertyStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryPropertyStore {
    properties: HashMap<(String, String), BTreeSet<String>>,
    counts: HashMap<(String, String), u64>,
    populations: HashMap<String, u64>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_properties(&mut self, entity: &str, semantic_type: &str, properties: &[&str]) {
        self.properties.insert(
            (entity.to_string(), semantic_type.to_string()),
            properties.iter().map(|p| p.to_string()).collect(),
        );
    }

    pub fn set_property_count(&mut self, property: &str, semantic_type: &str, count: u64) {
        self.counts
            .insert((property.to_string(), semantic_type.to_string()), count);
    }

    pub fn set_population(&mut self, semantic_type: &str, count: u64) {
        self.populations.insert(semantic_type.to_string(), count);
    }
}

impl PropertyStore for MemoryPropertyStore {
    fn get_properties(&self, entity: &str, semantic_type: &str) -> StorageResult<BTreeSet<String>> {
        Ok(self
            .properties
            .get(&(entity.to_string(), semantic_type.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn get_property_count(&self, property: &str, semantic_type: &str) -> StorageResult<Option<u64>> {
        Ok(self
            .counts
            .get(&(property.to_string(), semantic_type.to_string()))
            .copied())
    }

    fn get_population(&self, semantic_type: &str) -> StorageResult<Option<u64>> {
        Ok(self.populations.get(semantic_type).copied())
    }
}
