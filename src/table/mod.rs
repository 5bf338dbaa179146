//! Table view of materialized playlist records
//!
//! A plain ordered container with change notification, independent of any
//! widget toolkit. Row order is controlled here, not by the store.

mod reorder;
mod row_table;

pub use reorder::reorder;
pub use row_table::{RowTable, TableChange};
