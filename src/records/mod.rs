//! Record operations
//!
//! Adding inputs to the store through a pluggable parser, removing records
//! with increasing destructive scope, and writing edited tables back.

mod ops;
mod parser;

pub use ops::{
    add_paths, add_records, added_ids, remove_records, replace_column, replace_table, AddOutcome,
    AssumeYes, Confirm, RemoveReport, RemoveScope, PATH_FIELD,
};
pub use parser::{input_path, PathParser, RecordParser, TagParser};
