//! Link-level graph vocabulary: predicate specs, typed links, edge keys

mod link;
mod predicate;


use thiserror::Error;

pub use link::{reverse_key, EdgeKey, Link};
pub use predicate::{bare, namespaced, PredicateSpec, BIOLINK_PREFIX, PREDICATE_KEY};

/// Errors decoding predicate specs and edge keys
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid predicate spec: {0}")]
    PredicateSpec(String),

    #[error("Invalid edge key: {0}")]
    EdgeKey(String),
}
