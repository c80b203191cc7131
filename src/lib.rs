//! Answer Coalesce: statistical enrichment over TRAPI answer sets
//!
//! Given a group of answers (or the members of a set query), finds the graph
//! neighbors and properties shared by more of them than chance predicts and
//! folds those back into the message as new, evidence-backed results.
//!
//! # Core Concepts
//!
//! - **Opportunities**: groups of answers that differ at a single query node
//! - **Enrichments**: shared links or properties scored by an upper-tail p-value
//! - **Patches**: the change one winning enrichment makes to the message
//!
//! # Example
//!
//! ```
//! use answer_coalesce::{Coalescer, CoalesceParams, MemoryLookupStore, Message};
//! use std::sync::Arc;
//!
//! let coalescer = Coalescer::new(Arc::new(MemoryLookupStore::new()));
//! let message = Message::default();
//! let out = coalescer.coalesce_or_passthrough(message.clone(), &CoalesceParams::default());
//! assert_eq!(out, message);
//! ```

pub mod coalesce;
pub mod graph;
pub mod stats;
pub mod storage;
pub mod trapi;

pub use coalesce::{
    CoalesceError, CoalesceMode, CoalesceOutcome, CoalesceParams, CoalesceResult, Coalescer, EngineConfig,
    EnrichmentMethod, Opportunity, PropertyPatch,
};
pub use graph::{EdgeKey, Link, ParseError, PredicateSpec};
pub use stats::{CombineMethod, TailStrategy};
pub use storage::{
    LookupStore, MemoryLookupStore, MemoryPropertyStore, OpenStore, PropertyStore, SqliteLookupStore,
    SqlitePropertyStore, StorageError, StorageResult,
};
pub use trapi::{Message, Query};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
