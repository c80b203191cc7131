//! Common test utilities for coalescence scenarios
//!
//! Store fixtures with hand-picked counts, and TRAPI message builders.

#![allow(dead_code)]

pub mod messages;
pub mod stores;

pub use messages::{answer_message, set_query_message, DISEASE};
pub use stores::{
    overlapping_neighbor_store, property_store, shared_neighbor_store, CHEMICAL, GENE, POPULATION,
};
