//! A playlist materialized as a table, with edits written back
//!
//! The view holds the playlist's basename, not the playlist itself; the
//! playlist is looked up through the manager on every operation.

use crate::error::{GrimoireError, Result};
use crate::model::{Content, RecordId};
use crate::playlist::PlaylistManager;
use crate::records::{self, AddOutcome, Confirm, RecordParser, RemoveReport, RemoveScope};
use crate::rename::{self, RenamePlan, Template};
use crate::store::{Connection, ID_QUERY};
use crate::table::RowTable;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Rows of one playlist
#[derive(Debug)]
pub struct PlaylistView {
    basename: String,
    database: String,
    table: RowTable,
}

impl PlaylistView {
    /// Fetch a playlist's records into a table
    ///
    /// Playlist read errors (missing file, version mismatch) propagate. A
    /// store failure is logged and yields an empty table.
    pub fn materialize(
        manager: &mut PlaylistManager,
        conn: &mut Connection,
        basename: &str,
    ) -> Result<Self> {
        let playlist = manager.require_mut(basename)?;
        let database = playlist.database()?.to_string();
        let content = playlist.load_content()?.clone();

        let records = match conn.materialize(&database, &content) {
            Ok(records) => records,
            Err(GrimoireError::StoreUnavailable(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        log::info!("Materialized {} rows for playlist {}", records.len(), basename);

        Ok(Self {
            basename: basename.to_string(),
            database,
            table: RowTable::from_records(records),
        })
    }

    /// Re-run the playlist's query, keeping listeners
    pub fn refresh(&mut self, manager: &mut PlaylistManager, conn: &mut Connection) -> Result<()> {
        let content = manager.require_mut(&self.basename)?.load_content()?.clone();
        match conn.materialize(&self.database, &content) {
            Ok(records) => self.table.reset(records),
            Err(GrimoireError::StoreUnavailable(_)) => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &RowTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut RowTable {
        &mut self.table
    }

    /// Move rows and persist the new order as the playlist's id list
    ///
    /// Query-backed playlists cannot be reordered: the order would not
    /// survive the next reload. Nothing changes on any failure.
    pub fn move_rows(
        &mut self,
        manager: &mut PlaylistManager,
        moved: &[RecordId],
        target: usize,
    ) -> Result<Vec<RecordId>> {
        let playlist = manager.require_mut(&self.basename)?;
        if playlist.load_content()?.is_query() {
            return Err(GrimoireError::ReorderConflict(self.basename.clone()));
        }

        let order = crate::table::reorder(&self.table.ids(), moved, target)?;
        let previous = playlist.content().cloned().unwrap_or_default();
        playlist.set_ids(order.clone());
        if let Err(e) = playlist.save() {
            playlist.set_content(previous);
            return Err(e);
        }
        self.table.reindex(&order)?;
        Ok(order)
    }

    /// Edit one cell and write it to the store
    ///
    /// Returns `false` when nothing changed, including when the store
    /// rejected the write.
    pub fn edit_cell(
        &mut self,
        conn: &mut Connection,
        row: usize,
        column: &str,
        value: Value,
    ) -> bool {
        let Some(record) = self.table.row(row) else {
            return false;
        };
        let id = record.id;
        let old = record.get(column).cloned();
        if old.as_ref() == Some(&value) {
            return false;
        }

        let old_column = [(id, old.unwrap_or(Value::Null))];
        let new_column = [(id, value.clone())];
        if records::replace_column(conn, &self.database, column, &old_column, &new_column) == 0 {
            return false;
        }
        self.table.set_cell(row, column, value)
    }

    /// Add files as records and append them to the playlist
    ///
    /// For an id-list playlist the new ids are appended and saved; a
    /// query-backed playlist is refreshed instead.
    pub fn add_paths(
        &mut self,
        manager: &mut PlaylistManager,
        conn: &mut Connection,
        paths: &[PathBuf],
        parser: &dyn RecordParser,
    ) -> Result<Vec<AddOutcome>> {
        let outcomes = records::add_paths(conn, &self.database, paths, parser);
        let ids = records::added_ids(&outcomes);
        if ids.is_empty() {
            return Ok(outcomes);
        }

        let playlist = manager.require_mut(&self.basename)?;
        if playlist.append_ids(&ids)? {
            playlist.save()?;
            let mut params = crate::store::Params::new();
            params.insert(
                "ids".to_string(),
                Value::from(ids.iter().map(|id| id.0).collect::<Vec<u64>>()),
            );
            if let Ok(fetched) = conn.run(&self.database, ID_QUERY, &params) {
                let fetched = crate::store::reorder_by_ids(fetched, &ids);
                let end = self.table.row_count();
                self.table.insert_rows(end, fetched);
            }
        } else {
            self.refresh(manager, conn)?;
        }
        Ok(outcomes)
    }

    /// Remove rows with the given scope, keeping the playlist in step
    ///
    /// Once rows are gone from the table and store, a failure to save the
    /// shortened id list is logged and the report is still returned with
    /// `save_failed` set; the in-memory playlist holds the new list.
    pub fn remove(
        &mut self,
        manager: &mut PlaylistManager,
        conn: &mut Connection,
        ids: &[RecordId],
        scope: RemoveScope,
        confirm: &mut dyn Confirm,
    ) -> Result<RemoveReport> {
        let mut report =
            records::remove_records(conn, &self.database, &mut self.table, ids, scope, confirm);
        if report.removed_ids.is_empty() {
            return Ok(report);
        }

        let playlist = manager.require_mut(&self.basename)?;
        if let Content::Ids(current) = playlist.load_content()? {
            let kept: Vec<RecordId> = current
                .iter()
                .copied()
                .filter(|id| !report.removed_ids.contains(id))
                .collect();
            playlist.set_ids(kept);
            if let Err(e) = playlist.save() {
                log::error!("Removed rows but could not save playlist {}: {}", self.basename, e);
                report.save_failed = true;
            }
        }
        Ok(report)
    }

    /// Plan file moves for every row
    pub fn plan_renames(&self, template: &Template, root: &Path) -> Result<Vec<RenamePlan>> {
        rename::plan_renames(self.table.rows(), template, root)
    }

    /// Carry out planned moves, then reload the rows
    pub fn apply_renames(
        &mut self,
        manager: &mut PlaylistManager,
        conn: &mut Connection,
        plans: &[RenamePlan],
    ) -> Result<Vec<RecordId>> {
        let moved = rename::apply_renames(conn, &self.database, plans);
        self.refresh(manager, conn)?;
        Ok(moved)
    }
}
