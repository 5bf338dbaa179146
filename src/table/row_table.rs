//! Ordered, change-notifying table of materialized records

use super::reorder::reorder;
use crate::error::{GrimoireError, Result};
use crate::model::{Record, RecordId};
use crate::store::{is_reserved_column, DATABASE_COLUMN, ID_COLUMN};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Notification sent to table listeners after each change
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    /// All rows were replaced
    Reset,
    CellChanged { row: usize, column: String },
    RowsInserted { first: usize, count: usize },
    RowsRemoved { ids: Vec<RecordId> },
    /// Row order changed; the new order is given
    Reordered { order: Vec<RecordId> },
}

type Listener = Box<dyn FnMut(&TableChange)>;

/// Records laid out as rows, in an order independent of the store's
///
/// Columns are the reserved metadata columns followed by every field name
/// seen in the rows, in first-seen order.
pub struct RowTable {
    columns: Vec<String>,
    rows: Vec<Record>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for RowTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowTable")
            .field("columns", &self.columns)
            .field("rows", &self.rows.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for RowTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RowTable {
    /// Create an empty table with only the reserved columns
    pub fn new() -> Self {
        Self {
            columns: vec![ID_COLUMN.to_string(), DATABASE_COLUMN.to_string()],
            rows: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Create a table holding the given records, in the given order
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut table = Self::new();
        table.add_columns(&records);
        table.rows = records;
        table
    }

    /// Register a listener called after every change
    pub fn subscribe(&mut self, listener: impl FnMut(&TableChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> Option<&Record> {
        self.rows.get(row)
    }

    /// Record ids in row order
    pub fn ids(&self) -> Vec<RecordId> {
        self.rows.iter().map(|r| r.id).collect()
    }

    /// Row index of a record
    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Write one cell; reserved columns are read-only
    ///
    /// Returns `false` if the row does not exist, the column is reserved or
    /// the value is unchanged.
    pub fn set_cell(&mut self, row: usize, column: &str, value: Value) -> bool {
        if is_reserved_column(column) {
            log::warn!("Column {} is read-only", column);
            return false;
        }
        let Some(record) = self.rows.get_mut(row) else {
            return false;
        };
        if record.get(column) == Some(&value) {
            return false;
        }
        record.fields.insert(column.to_string(), value);
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
        self.notify(TableChange::CellChanged {
            row,
            column: column.to_string(),
        });
        true
    }

    /// Insert records before row `at` (clamped to the end)
    pub fn insert_rows(&mut self, at: usize, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        let first = at.min(self.rows.len());
        let count = records.len();
        self.add_columns(&records);
        self.rows.splice(first..first, records);
        self.notify(TableChange::RowsInserted { first, count });
    }

    /// Remove rows by record id, returning the removed records
    pub fn remove_rows(&mut self, ids: &[RecordId]) -> Vec<Record> {
        let wanted: HashSet<RecordId> = ids.iter().copied().collect();
        let (removed, kept): (Vec<Record>, Vec<Record>) = std::mem::take(&mut self.rows)
            .into_iter()
            .partition(|r| wanted.contains(&r.id));
        self.rows = kept;

        if !removed.is_empty() {
            self.notify(TableChange::RowsRemoved {
                ids: removed.iter().map(|r| r.id).collect(),
            });
        }
        removed
    }

    /// Replace every row
    pub fn reset(&mut self, records: Vec<Record>) {
        self.columns.truncate(2);
        self.add_columns(&records);
        self.rows = records;
        self.notify(TableChange::Reset);
    }

    /// Put rows in exactly the given order
    ///
    /// `order` must be a permutation of the current ids.
    pub fn reindex(&mut self, order: &[RecordId]) -> Result<()> {
        let current: HashSet<RecordId> = self.rows.iter().map(|r| r.id).collect();
        let requested: HashSet<RecordId> = order.iter().copied().collect();
        if order.len() != self.rows.len() || current != requested {
            return Err(GrimoireError::InvalidReorderRequest(
                "new order does not match the table rows".to_string(),
            ));
        }

        let mut rows = std::mem::take(&mut self.rows);
        let mut reordered = Vec::with_capacity(rows.len());
        for id in order {
            if let Some(index) = rows.iter().position(|r| r.id == *id) {
                reordered.push(rows.swap_remove(index));
            }
        }
        self.rows = reordered;
        self.notify(TableChange::Reordered {
            order: order.to_vec(),
        });
        Ok(())
    }

    /// Move rows to an offset among the rows that are not moved
    ///
    /// Returns the new id order. Invalid requests leave the table unchanged.
    pub fn move_rows(&mut self, moved: &[RecordId], target: usize) -> Result<Vec<RecordId>> {
        let order = reorder(&self.ids(), moved, target)?;
        self.reindex(&order)?;
        Ok(order)
    }

    fn add_columns(&mut self, records: &[Record]) {
        for record in records {
            for field in record.fields.keys() {
                if !self.columns.iter().any(|c| c == field) {
                    self.columns.push(field.clone());
                }
            }
        }
    }

    fn notify(&mut self, change: TableChange) {
        for listener in self.listeners.iter_mut() {
            listener(&change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Fields;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(id: u64, title: &str) -> Record {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), json!(title));
        Record::new(RecordId(id), fields)
    }

    fn table() -> RowTable {
        RowTable::from_records(vec![
            record(1, "a"),
            record(2, "b"),
            record(3, "c"),
            record(4, "d"),
            record(5, "e"),
        ])
    }

    fn recorder(table: &mut RowTable) -> Rc<RefCell<Vec<TableChange>>> {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        table.subscribe(move |change| sink.borrow_mut().push(change.clone()));
        changes
    }

    #[test]
    fn test_columns_start_with_reserved() {
        let table = table();
        assert_eq!(table.columns(), &["_id", "_db", "title"]);
        assert_eq!(table.row_count(), 5);
        assert_eq!(table.column_count(), 3);
    }

    #[test]
    fn test_move_rows_reindexes_and_notifies() {
        let mut table = table();
        let changes = recorder(&mut table);

        let order = table.move_rows(&[RecordId(2), RecordId(4)], 1).unwrap();
        let expected: Vec<RecordId> = [1, 2, 4, 3, 5].into_iter().map(RecordId).collect();
        assert_eq!(order, expected);
        assert_eq!(table.ids(), expected);
        assert_eq!(table.cell(2, "title"), Some(&json!("d")));
        assert_eq!(
            changes.borrow().as_slice(),
            &[TableChange::Reordered { order: expected }]
        );
    }

    #[test]
    fn test_invalid_move_leaves_table_untouched() {
        let mut table = table();
        let changes = recorder(&mut table);
        assert!(table.move_rows(&[RecordId(9)], 0).is_err());
        assert_eq!(table.ids(), [1, 2, 3, 4, 5].into_iter().map(RecordId).collect::<Vec<_>>());
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn test_set_cell() {
        let mut table = table();
        let changes = recorder(&mut table);

        assert!(table.set_cell(0, "year", json!(1620)));
        assert!(!table.set_cell(0, "year", json!(1620)));
        assert!(!table.set_cell(0, ID_COLUMN, json!(7)));
        assert!(!table.set_cell(42, "title", json!("x")));
        assert_eq!(table.columns().last().map(String::as_str), Some("year"));
        assert_eq!(changes.borrow().len(), 1);
    }

    #[test]
    fn test_insert_and_remove_rows() {
        let mut table = table();
        table.insert_rows(1, vec![record(9, "z")]);
        assert_eq!(table.position(RecordId(9)), Some(1));

        let removed = table.remove_rows(&[RecordId(9), RecordId(1), RecordId(77)]);
        assert_eq!(removed.len(), 2);
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.position(RecordId(2)), Some(0));
    }

    #[test]
    fn test_reindex_requires_permutation() {
        let mut table = table();
        assert!(table.reindex(&[RecordId(1), RecordId(2)]).is_err());
        let reversed: Vec<RecordId> = (1..=5).rev().map(RecordId).collect();
        table.reindex(&reversed).unwrap();
        assert_eq!(table.ids(), reversed);
    }
}
