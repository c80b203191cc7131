//! Storage trait definitions
//!
//! The link/count/provenance service and the property tables are static
//! knowledge artifacts built elsewhere. Coalescence only reads them.

use crate::graph::{Link, ParseError, PredicateSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed payload: {0}")]
    Malformed(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One knowledge source behind an edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub resource_id: String,
    pub resource_role: String,
}

impl ProvenanceRecord {
    pub fn new(resource_id: impl Into<String>, resource_role: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_role: resource_role.into(),
        }
    }

    pub fn primary(resource_id: impl Into<String>) -> Self {
        Self::new(resource_id, "primary_knowledge_source")
    }
}

/// Key-value view over the precomputed link graph
///
/// Missing entries are `Ok(None)` / empty, never errors. Errors mean the
/// store itself could not answer. Batched variants return one entry per
/// requested key, in request order.
pub trait LookupStore: Send + Sync {
    /// Links owned by `entity`, oriented from its side
    fn get_links(&self, entity: &str) -> StorageResult<Vec<Link>>;

    fn get_links_batch(&self, entities: &[String]) -> StorageResult<Vec<Vec<Link>>> {
        entities.iter().map(|e| self.get_links(e)).collect()
    }

    /// Biolink categories of `entity`
    fn get_types(&self, entity: &str) -> StorageResult<Vec<String>>;

    fn get_types_batch(&self, entities: &[String]) -> StorageResult<Vec<Vec<String>>> {
        entities.iter().map(|e| self.get_types(e)).collect()
    }

    /// Display name of `entity`
    fn get_name(&self, entity: &str) -> StorageResult<Option<String>>;

    fn get_names_batch(&self, entities: &[String]) -> StorageResult<Vec<Option<String>>> {
        entities.iter().map(|e| self.get_name(e)).collect()
    }

    /// How many entities of `semantic_type` have this link to `entity`,
    /// where `is_source` says whether `entity` is the edge subject
    fn get_count(
        &self,
        entity: &str,
        predicate: &PredicateSpec,
        is_source: bool,
        semantic_type: &str,
    ) -> StorageResult<Option<u64>>;

    /// Total number of entities of `semantic_type`
    fn get_population(&self, semantic_type: &str) -> StorageResult<Option<f64>>;

    /// Knowledge sources for an edge key (`"<s> <predicate_json> <o>"`), as stored
    fn get_provenance(&self, edge_key: &str) -> StorageResult<Option<Vec<ProvenanceRecord>>>;
}

/// Tabular view over per-type qualitative properties
pub trait PropertyStore: Send + Sync {
    fn get_properties(&self, entity: &str, semantic_type: &str) -> StorageResult<BTreeSet<String>>;

    /// How many entities of `semantic_type` carry `property`
    fn get_property_count(&self, property: &str, semantic_type: &str) -> StorageResult<Option<u64>>;

    /// Number of entities of `semantic_type` with any property
    fn get_population(&self, semantic_type: &str) -> StorageResult<Option<u64>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
