//! Add, remove and replace records in one database partition
//!
//! Store failures never abort these operations with an error: they are
//! logged, and the affected items are reported as failed or skipped.

use super::parser::RecordParser;
use crate::model::{value_text, Fields, Record, RecordId};
use crate::store::{is_reserved_column, Connection};
use crate::table::RowTable;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Field naming the external resource (file) behind a record
pub const PATH_FIELD: &str = "path";

/// Result of adding one input
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added { label: String, id: RecordId },
    Failed { label: String, reason: String },
}

impl AddOutcome {
    pub fn id(&self) -> Option<RecordId> {
        match self {
            AddOutcome::Added { id, .. } => Some(*id),
            AddOutcome::Failed { .. } => None,
        }
    }
}

/// Identifiers of the successfully added records, in input order
pub fn added_ids(outcomes: &[AddOutcome]) -> Vec<RecordId> {
    outcomes.iter().filter_map(AddOutcome::id).collect()
}

/// Create one record per field map; failures are logged and skipped
pub fn add_records(conn: &mut Connection, database: &str, records: Vec<Fields>) -> Vec<AddOutcome> {
    let total = records.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, fields) in records.into_iter().enumerate() {
        let label = fields
            .get(PATH_FIELD)
            .or_else(|| fields.get("title"))
            .map(value_text)
            .unwrap_or_else(|| format!("record #{}", i + 1));

        let outcome = match conn.create(database, fields) {
            Ok(id) => {
                log::debug!("[{}/{}] Added {} as {}", i + 1, total, label, id);
                AddOutcome::Added { label, id }
            }
            Err(e) => AddOutcome::Failed {
                label,
                reason: e.to_string(),
            },
        };
        outcomes.push(outcome);
    }

    log_outcomes(&outcomes);
    outcomes
}

/// Parse each path with `parser`, then create a record for it
pub fn add_paths(
    conn: &mut Connection,
    database: &str,
    paths: &[PathBuf],
    parser: &dyn RecordParser,
) -> Vec<AddOutcome> {
    let mut outcomes = Vec::with_capacity(paths.len());

    for path in paths {
        let label = path.to_string_lossy().to_string();
        let outcome = match parser.parse(path) {
            Ok(fields) => match conn.create(database, fields) {
                Ok(id) => AddOutcome::Added { label, id },
                Err(e) => AddOutcome::Failed {
                    label,
                    reason: e.to_string(),
                },
            },
            Err(e) => {
                log::warn!("Cannot parse {:?}: {:#}", path, e);
                AddOutcome::Failed {
                    label,
                    reason: format!("{:#}", e),
                }
            }
        };
        outcomes.push(outcome);
    }

    log_outcomes(&outcomes);
    outcomes
}

fn log_outcomes(outcomes: &[AddOutcome]) {
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, AddOutcome::Failed { .. }))
        .count();
    if failed > 0 {
        log::warn!("Added {} of {} records", outcomes.len() - failed, outcomes.len());
    } else {
        log::info!("Added {} records", outcomes.len());
    }
}

/// How far a removal reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveScope {
    /// Drop rows from the table only
    View,

    /// Also delete the records from the store
    Store,

    /// Also delete the records' files from disk
    StoreAndResource,
}

impl RemoveScope {
    pub fn is_destructive(self) -> bool {
        !matches!(self, RemoveScope::View)
    }
}

/// Asks the user before a destructive removal
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Confirms everything without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, prompt: &str) -> bool {
        log::debug!("Confirmed without asking: {}", prompt);
        true
    }
}

/// What a removal did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveReport {
    /// Rows taken out of the table
    pub removed_ids: Vec<RecordId>,

    /// Records deleted from the store
    pub deleted_records: usize,

    /// Files deleted from disk
    pub deleted_files: Vec<PathBuf>,

    /// The user declined, or the store call failed; nothing changed
    pub aborted: bool,

    /// Rows were removed but the playlist file could not be rewritten
    pub save_failed: bool,
}

/// Remove records with the given scope
///
/// The destructive scopes ask `confirm` first and change nothing when
/// declined. A failed store call also changes nothing.
pub fn remove_records(
    conn: &mut Connection,
    database: &str,
    table: &mut RowTable,
    ids: &[RecordId],
    scope: RemoveScope,
    confirm: &mut dyn Confirm,
) -> RemoveReport {
    let mut report = RemoveReport::default();
    if ids.is_empty() {
        return report;
    }

    if scope.is_destructive() {
        let prompt = match scope {
            RemoveScope::StoreAndResource => format!(
                "Delete {} records from {} and their files from disk?",
                ids.len(),
                database
            ),
            _ => format!("Delete {} records from {}?", ids.len(), database),
        };
        if !confirm.confirm(&prompt) {
            log::info!("Removal cancelled");
            report.aborted = true;
            return report;
        }
    }

    let resources: Vec<PathBuf> = if scope == RemoveScope::StoreAndResource {
        ids.iter()
            .filter_map(|id| table.position(*id).and_then(|row| table.row(row)))
            .filter_map(|record| record.text(PATH_FIELD))
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .collect()
    } else {
        Vec::new()
    };

    if scope.is_destructive() {
        match conn.delete(database, ids) {
            Ok(count) => report.deleted_records = count,
            Err(_) => {
                report.aborted = true;
                return report;
            }
        }
    }

    for path in resources {
        match delete_resource(&path) {
            Ok(()) => report.deleted_files.push(path),
            Err(e) => log::warn!("Failed to delete {:?}: {}", path, e),
        }
    }

    report.removed_ids = table.remove_rows(ids).into_iter().map(|r| r.id).collect();
    log::info!(
        "Removed {} rows ({} records, {} files)",
        report.removed_ids.len(),
        report.deleted_records,
        report.deleted_files.len()
    );
    report
}

/// Delete one record's file; directories are never removed
fn delete_resource(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "refusing to delete a directory",
        ));
    }
    fs::remove_file(path)
}

/// Update the store so records in `old` look like their match in `new`
///
/// Records are matched by id; only fields that differ are sent, one update
/// per changed record. Returns the number of records updated.
pub fn replace_table(conn: &mut Connection, database: &str, old: &[Record], new: &[Record]) -> usize {
    if old == new {
        log::info!("Nothing to replace, tables are equal");
        return 0;
    }

    let old_by_id: HashMap<RecordId, &Record> = old.iter().map(|r| (r.id, r)).collect();
    let mut updated = 0;

    for record in new {
        let Some(previous) = old_by_id.get(&record.id) else {
            log::warn!("Record {} is not in the original table, skipping", record.id);
            continue;
        };
        let changes: Fields = record
            .fields
            .iter()
            .filter(|(column, value)| {
                !is_reserved_column(column) && previous.fields.get(*column) != Some(*value)
            })
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();

        if changes.is_empty() {
            continue;
        }
        log::debug!("Updating {} field(s) of record {}", changes.len(), record.id);
        if conn.update(database, record.id, changes).is_ok() {
            updated += 1;
        }
    }

    log::info!("Replaced {} records in {}", updated, database);
    updated
}

/// Update one column from an old/new pair of `(id, value)` lists
pub fn replace_column(
    conn: &mut Connection,
    database: &str,
    column: &str,
    old: &[(RecordId, Value)],
    new: &[(RecordId, Value)],
) -> usize {
    if old == new {
        log::info!("Nothing to replace, column {} is unchanged", column);
        return 0;
    }
    if is_reserved_column(column) {
        log::warn!("Column {} is read-only", column);
        return 0;
    }

    let old_by_id: HashMap<RecordId, &Value> = old.iter().map(|(id, v)| (*id, v)).collect();
    let mut updated = 0;

    for (id, value) in new {
        if old_by_id.get(id) == Some(&value) {
            continue;
        }
        let mut change = Fields::new();
        change.insert(column.to_string(), value.clone());
        if conn.update(database, *id, change).is_ok() {
            updated += 1;
        }
    }

    log::info!("Replaced {} values of column {} in {}", updated, column, database);
    updated
}
