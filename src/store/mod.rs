//! Backing record store
//!
//! The store is reached through the [`GraphStore`] trait so the playlist
//! layer does not depend on a particular database. [`Connection`] wraps a
//! store, adds the reserved metadata columns to every result, and turns
//! store failures into logged [`GrimoireError::StoreUnavailable`] errors.

mod memory;
pub mod query;
mod resolve;

pub use memory::MemoryStore;
pub use query::{Params, QueryError};
pub use resolve::{reorder_by_ids, resolve, ResolvedQuery, ID_QUERY};

use crate::error::{GrimoireError, Result};
use crate::model::{Content, Fields, Record, RecordId};
use thiserror::Error;

/// Reserved column holding the record id
pub const ID_COLUMN: &str = "_id";

/// Reserved column holding the database partition name
pub const DATABASE_COLUMN: &str = "_db";

/// Whether a column is filled in by the connection rather than stored
pub fn is_reserved_column(column: &str) -> bool {
    column == ID_COLUMN || column == DATABASE_COLUMN
}

/// Errors reported by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("unknown record {0}")]
    UnknownRecord(RecordId),

    #[error("store is offline")]
    Offline,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A graph database holding records in named partitions
pub trait GraphStore {
    /// Run a read query against one database partition
    fn query(&mut self, database: &str, query: &str, params: &Params)
        -> std::result::Result<Vec<Record>, StoreError>;

    /// Create a record and return its new identifier
    fn create(&mut self, database: &str, fields: Fields) -> std::result::Result<RecordId, StoreError>;

    /// Set the given fields on a record, keeping the others
    fn update(&mut self, database: &str, id: RecordId, fields: Fields)
        -> std::result::Result<(), StoreError>;

    /// Delete records, returning how many existed
    fn delete(&mut self, database: &str, ids: &[RecordId]) -> std::result::Result<usize, StoreError>;

    /// Persist pending changes
    fn flush(&mut self) -> std::result::Result<(), StoreError> {
        Ok(())
    }
}

/// Connection to a record store
///
/// Every call is synchronous. Failures are logged here and surfaced as
/// [`GrimoireError::StoreUnavailable`]; nothing is retried.
pub struct Connection {
    store: Box<dyn GraphStore>,
}

impl Connection {
    pub fn new(store: impl GraphStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Run a query and return records with the reserved columns filled in
    pub fn run(&mut self, database: &str, query: &str, params: &Params) -> Result<Vec<Record>> {
        log::debug!("Query on {}: {}", database, query);
        let mut records = self
            .store
            .query(database, query, params)
            .map_err(|e| unavailable("query", database, e))?;

        for record in records.iter_mut() {
            fill_reserved(record, database);
        }
        Ok(records)
    }

    /// Fetch the records described by playlist content, in playlist order
    ///
    /// Empty content returns no records without contacting the store.
    pub fn materialize(&mut self, database: &str, content: &Content) -> Result<Vec<Record>> {
        let Some(resolved) = resolve(content) else {
            log::debug!("Empty content, skipping store");
            return Ok(Vec::new());
        };

        let records = self.run(database, &resolved.text, &resolved.params)?;
        Ok(match resolved.order {
            Some(ids) => reorder_by_ids(records, &ids),
            None => records,
        })
    }

    pub fn create(&mut self, database: &str, fields: Fields) -> Result<RecordId> {
        self.store
            .create(database, strip_reserved(fields))
            .map_err(|e| unavailable("create", database, e))
    }

    pub fn update(&mut self, database: &str, id: RecordId, fields: Fields) -> Result<()> {
        self.store
            .update(database, id, strip_reserved(fields))
            .map_err(|e| unavailable("update", database, e))
    }

    pub fn delete(&mut self, database: &str, ids: &[RecordId]) -> Result<usize> {
        self.store
            .delete(database, ids)
            .map_err(|e| unavailable("delete", database, e))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store
            .flush()
            .map_err(|e| unavailable("flush", "*", e))
    }
}

fn fill_reserved(record: &mut Record, database: &str) {
    record
        .fields
        .insert(ID_COLUMN.to_string(), serde_json::Value::from(record.id.0));
    record
        .fields
        .insert(DATABASE_COLUMN.to_string(), serde_json::Value::from(database));
}

fn strip_reserved(mut fields: Fields) -> Fields {
    fields.retain(|column, _| !is_reserved_column(column));
    fields
}

fn unavailable(operation: &str, database: &str, error: StoreError) -> GrimoireError {
    log::error!("Store {} on {} failed: {}", operation, database, error);
    GrimoireError::StoreUnavailable(format!("{} on {}: {}", operation, database, error))
}
