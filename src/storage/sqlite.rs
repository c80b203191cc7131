//! SQLite backends for the lookup and property stores
//!
//! The knowledge files are produced offline. The `insert_*` helpers exist for
//! loading fixtures and small deployments; coalescence itself never writes.

use super::traits::{
    LookupStore, OpenStore, PropertyStore, ProvenanceRecord, StorageError, StorageResult,
};
use crate::graph::{EdgeKey, Link, PredicateSpec};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

fn lock(conn: &Mutex<Connection>) -> StorageResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| StorageError::Unavailable("connection mutex poisoned".to_string()))
}

fn open_connection(path: &Path) -> StorageResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Connection::open(path)?)
}

// ---------------------------------------------------------------------------
// Lookup store
// ---------------------------------------------------------------------------

/// SQLite-backed [`LookupStore`]
///
/// Thread-safe via internal mutex on the connection.
pub struct SqliteLookupStore {
    conn: Mutex<Connection>,
}

impl SqliteLookupStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Link lists, oriented from `entity`
            CREATE TABLE IF NOT EXISTS links (
                entity TEXT NOT NULL,
                other TEXT NOT NULL,
                predicate TEXT NOT NULL,
                is_source INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_links_entity ON links(entity);

            CREATE TABLE IF NOT EXISTS node_types (
                entity TEXT NOT NULL,
                semantic_type TEXT NOT NULL,
                PRIMARY KEY (entity, semantic_type)
            );

            CREATE TABLE IF NOT EXISTS node_names (
                entity TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );

            -- Population hit counts per (entity, predicate, orientation, type)
            CREATE TABLE IF NOT EXISTS link_counts (
                entity TEXT NOT NULL,
                predicate TEXT NOT NULL,
                is_source INTEGER NOT NULL,
                semantic_type TEXT NOT NULL,
                count INTEGER NOT NULL,
                PRIMARY KEY (entity, predicate, is_source, semantic_type)
            );

            CREATE TABLE IF NOT EXISTS populations (
                semantic_type TEXT PRIMARY KEY,
                count REAL NOT NULL
            );

            -- Edge key -> JSON list of {resource_id, resource_role}
            CREATE TABLE IF NOT EXISTS provenance (
                edge_key TEXT PRIMARY KEY,
                sources_json TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Register an edge on both endpoints' link lists
    pub fn insert_edge(&self, subject: &str, predicate: &PredicateSpec, object: &str) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        let json = predicate.canonical_json();
        conn.execute(
            "INSERT INTO links (entity, other, predicate, is_source) VALUES (?1, ?2, ?3, 1)",
            params![subject, object, json],
        )?;
        conn.execute(
            "INSERT INTO links (entity, other, predicate, is_source) VALUES (?1, ?2, ?3, 0)",
            params![object, subject, json],
        )?;
        Ok(())
    }

    pub fn insert_types(&self, entity: &str, types: &[&str]) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        for t in types {
            conn.execute(
                "INSERT OR IGNORE INTO node_types (entity, semantic_type) VALUES (?1, ?2)",
                params![entity, t],
            )?;
        }
        Ok(())
    }

    pub fn insert_name(&self, entity: &str, name: &str) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO node_names (entity, name) VALUES (?1, ?2)",
            params![entity, name],
        )?;
        Ok(())
    }

    pub fn insert_count(
        &self,
        entity: &str,
        predicate: &PredicateSpec,
        is_source: bool,
        semantic_type: &str,
        count: u64,
    ) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO link_counts (entity, predicate, is_source, semantic_type, count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entity, predicate.canonical_json(), is_source, semantic_type, count as i64],
        )?;
        Ok(())
    }

    pub fn insert_population(&self, semantic_type: &str, count: f64) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO populations (semantic_type, count) VALUES (?1, ?2)",
            params![semantic_type, count],
        )?;
        Ok(())
    }

    pub fn insert_provenance(&self, key: &EdgeKey, records: &[ProvenanceRecord]) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO provenance (edge_key, sources_json) VALUES (?1, ?2)",
            params![key.to_string(), serde_json::to_string(records)?],
        )?;
        Ok(())
    }

    fn links_for(conn: &Connection, entity: &str) -> StorageResult<Vec<Link>> {
        let mut stmt = conn.prepare_cached(
            "SELECT other, predicate, is_source FROM links WHERE entity = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![entity], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;

        let mut links = Vec::new();
        for row in rows {
            let (other, predicate, is_source) = row?;
            links.push(Link::new(other, PredicateSpec::parse(&predicate)?, is_source));
        }
        Ok(links)
    }

    fn types_for(conn: &Connection, entity: &str) -> StorageResult<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT semantic_type FROM node_types WHERE entity = ?1 ORDER BY rowid",
        )?;
        let types = stmt
            .query_map(params![entity], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(types)
    }

    fn name_for(conn: &Connection, entity: &str) -> StorageResult<Option<String>> {
        let mut stmt = conn.prepare_cached("SELECT name FROM node_names WHERE entity = ?1")?;
        Ok(stmt
            .query_row(params![entity], |row| row.get::<_, String>(0))
            .optional()?)
    }
}

impl OpenStore for SqliteLookupStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = open_connection(path.as_ref())?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl LookupStore for SqliteLookupStore {
    fn get_links(&self, entity: &str) -> StorageResult<Vec<Link>> {
        let conn = lock(&self.conn)?;
        Self::links_for(&conn, entity)
    }

    // Batches hold the connection once and reuse the cached statement
    fn get_links_batch(&self, entities: &[String]) -> StorageResult<Vec<Vec<Link>>> {
        let conn = lock(&self.conn)?;
        entities.iter().map(|e| Self::links_for(&conn, e)).collect()
    }

    fn get_types(&self, entity: &str) -> StorageResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        Self::types_for(&conn, entity)
    }

    fn get_types_batch(&self, entities: &[String]) -> StorageResult<Vec<Vec<String>>> {
        let conn = lock(&self.conn)?;
        entities.iter().map(|e| Self::types_for(&conn, e)).collect()
    }

    fn get_name(&self, entity: &str) -> StorageResult<Option<String>> {
        let conn = lock(&self.conn)?;
        Self::name_for(&conn, entity)
    }

    fn get_names_batch(&self, entities: &[String]) -> StorageResult<Vec<Option<String>>> {
        let conn = lock(&self.conn)?;
        entities.iter().map(|e| Self::name_for(&conn, e)).collect()
    }

    fn get_count(
        &self,
        entity: &str,
        predicate: &PredicateSpec,
        is_source: bool,
        semantic_type: &str,
    ) -> StorageResult<Option<u64>> {
        let conn = lock(&self.conn)?;
        let count: Option<i64> = conn
            .query_row(
                "SELECT count FROM link_counts
                 WHERE entity = ?1 AND predicate = ?2 AND is_source = ?3 AND semantic_type = ?4",
                params![entity, predicate.canonical_json(), is_source, semantic_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.map(|c| c.max(0) as u64))
    }

    fn get_population(&self, semantic_type: &str) -> StorageResult<Option<f64>> {
        let conn = lock(&self.conn)?;
        Ok(conn
            .query_row(
                "SELECT count FROM populations WHERE semantic_type = ?1",
                params![semantic_type],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get_provenance(&self, edge_key: &str) -> StorageResult<Option<Vec<ProvenanceRecord>>> {
        let conn = lock(&self.conn)?;
        let json: Option<String> = conn
            .query_row(
                "SELECT sources_json FROM provenance WHERE edge_key = ?1",
                params![edge_key],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Property store
// ---------------------------------------------------------------------------

/// SQLite-backed [`PropertyStore`]
pub struct SqlitePropertyStore {
    conn: Mutex<Connection>,
}

impl SqlitePropertyStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS properties (
                entity TEXT NOT NULL,
                semantic_type TEXT NOT NULL,
                property TEXT NOT NULL,
                PRIMARY KEY (entity, semantic_type, property)
            );

            CREATE TABLE IF NOT EXISTS property_counts (
                property TEXT NOT NULL,
                semantic_type TEXT NOT NULL,
                count INTEGER NOT NULL,
                PRIMARY KEY (property, semantic_type)
            );

            CREATE TABLE IF NOT EXISTS populations (
                semantic_type TEXT PRIMARY KEY,
                count INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn insert_properties(&self, entity: &str, semantic_type: &str, properties: &[&str]) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        for p in properties {
            conn.execute(
                "INSERT OR IGNORE INTO properties (entity, semantic_type, property) VALUES (?1, ?2, ?3)",
                params![entity, semantic_type, p],
            )?;
        }
        Ok(())
    }

    pub fn insert_property_count(&self, property: &str, semantic_type: &str, count: u64) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO property_counts (property, semantic_type, count) VALUES (?1, ?2, ?3)",
            params![property, semantic_type, count as i64],
        )?;
        Ok(())
    }

    pub fn insert_population(&self, semantic_type: &str, count: u64) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO populations (semantic_type, count) VALUES (?1, ?2)",
            params![semantic_type, count as i64],
        )?;
        Ok(())
    }
}

impl OpenStore for SqlitePropertyStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = open_connection(path.as_ref())?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl PropertyStore for SqlitePropertyStore {
    fn get_properties(&self, entity: &str, semantic_type: &str) -> StorageResult<BTreeSet<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare_cached(
            "SELECT property FROM properties WHERE entity = ?1 AND semantic_type = ?2",
        )?;
        let props = stmt
            .query_map(params![entity, semantic_type], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(props)
    }

    fn get_property_count(&self, property: &str, semantic_type: &str) -> StorageResult<Option<u64>> {
        let conn = lock(&self.conn)?;
        let count: Option<i64> = conn
            .query_row(
                "SELECT count FROM property_counts WHERE property = ?1 AND semantic_type = ?2",
                params![property, semantic_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.map(|c| c.max(0) as u64))
    }

    fn get_population(&self, semantic_type: &str) -> StorageResult<Option<u64>> {
        let conn = lock(&self.conn)?;
        let count: Option<i64> = conn
            .query_row(
                "SELECT count FROM populations WHERE semantic_type = ?1",
                params![semantic_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.map(|c| c.max(0) as u64))
    }
}
