//! Read-only knowledge stores consulted during coalescence
//!
//! Both stores are reached through traits so the engine never knows whether
//! it is talking to SQLite files, an in-memory fixture, or something remote.

mod memory;
mod sqlite;
mod traits;

pub use memory::{MemoryLookupStore, MemoryPropertyStore};
pub use sqlite::{SqliteLookupStore, SqlitePropertyStore};
pub use traits::{
    LookupStore, OpenStore, PropertyStore, ProvenanceRecord, StorageError, StorageResult,
};
