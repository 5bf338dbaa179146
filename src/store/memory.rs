//! JSON-file-backed record store

use super::query::{self, Params};
use super::{GraphStore, StoreError};
use crate::model::{Fields, Record, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialized form of the store file
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    /// Next identifier to hand out (shared by all partitions)
    next_id: u64,

    /// Records per database partition
    databases: BTreeMap<String, BTreeMap<u64, Fields>>,
}

/// Record store held in memory, optionally persisted to a JSON file
#[derive(Debug)]
pub struct MemoryStore {
    /// File written by `flush`, if any
    path: Option<PathBuf>,

    data: StoreData,

    /// Unflushed changes exist
    dirty: bool,

    /// When false every call fails, simulating a lost connection
    online: bool,
}

impl MemoryStore {
    /// Create an empty store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: StoreData {
                next_id: 1,
                databases: BTreeMap::new(),
            },
            dirty: false,
            online: true,
        }
    }

    /// Open a store file, starting empty if it does not exist yet
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut store = Self::in_memory();
        store.path = Some(path.to_path_buf());

        if path.exists() {
            let text = fs::read_to_string(path)?;
            store.data = serde_json::from_str(&text)?;
            store.data.next_id = store.data.next_id.max(1);
            log::info!(
                "Loaded store {:?}: {} records in {} databases",
                path,
                store.record_count(),
                store.data.databases.len()
            );
        } else {
            log::info!("Store {:?} does not exist yet, starting empty", path);
        }
        Ok(store)
    }

    /// Toggle simulated connectivity
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Insert a record under a chosen identifier
    pub fn insert_with_id(&mut self, database: &str, id: RecordId, fields: Fields) {
        self.data
            .databases
            .entry(database.to_string())
            .or_default()
            .insert(id.0, fields);
        self.data.next_id = self.data.next_id.max(id.0 + 1);
        self.dirty = true;
    }

    /// Total number of records across all partitions
    pub fn record_count(&self) -> usize {
        self.data.databases.values().map(BTreeMap::len).sum()
    }

    /// Look up a record directly
    pub fn get(&self, database: &str, id: RecordId) -> Option<Record> {
        self.data
            .databases
            .get(database)
            .and_then(|records| records.get(&id.0))
            .map(|fields| Record::new(id, fields.clone()))
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online {
            Ok(())
        } else {
            Err(StoreError::Offline)
        }
    }
}

impl GraphStore for MemoryStore {
    fn query(&mut self, database: &str, text: &str, params: &Params) -> Result<Vec<Record>, StoreError> {
        self.check_online()?;
        let parsed = query::parse(text, params)?;

        let records: Vec<Record> = self
            .data
            .databases
            .get(database)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, fields)| Record::new(RecordId(*id), fields.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(parsed.run(records.iter()))
    }

    fn create(&mut self, database: &str, fields: Fields) -> Result<RecordId, StoreError> {
        self.check_online()?;
        let id = RecordId(self.data.next_id);
        self.insert_with_id(database, id, fields);
        log::debug!("Created record {} in {}", id, database);
        Ok(id)
    }

    fn update(&mut self, database: &str, id: RecordId, fields: Fields) -> Result<(), StoreError> {
        self.check_online()?;
        let record = self
            .data
            .databases
            .get_mut(database)
            .and_then(|records| records.get_mut(&id.0))
            .ok_or(StoreError::UnknownRecord(id))?;
        record.extend(fields);
        self.dirty = true;
        Ok(())
    }

    fn delete(&mut self, database: &str, ids: &[RecordId]) -> Result<usize, StoreError> {
        self.check_online()?;
        let Some(records) = self.data.databases.get_mut(database) else {
            return Ok(0);
        };
        let removed = ids.iter().filter(|id| records.remove(&id.0).is_some()).count();
        if removed > 0 {
            self.dirty = true;
        }
        Ok(removed)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.check_online()?;
        if let (true, Some(path)) = (self.dirty, &self.path) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_string_pretty(&self.data)?)?;
            log::info!("Store written to {:?}", path);
        }
        self.dirty = false;
        Ok(())
    }
}
