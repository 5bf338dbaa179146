//! Error types for Grimoire

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Grimoire operations
pub type Result<T> = std::result::Result<T, GrimoireError>;

/// Grimoire error types
#[derive(Error, Debug)]
pub enum GrimoireError {
    /// The playlist file carries a format version we cannot read
    #[error("Unsupported playlist format version {found:?} (expected {expected:?})")]
    VersionMismatch { found: String, expected: String },

    /// An expected playlist file is absent
    #[error("Playlist file not found: {0:?}")]
    NotFound(PathBuf),

    /// The backing store returned no result
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A reorder request names rows that cannot be moved
    #[error("Invalid reorder request: {0}")]
    InvalidReorderRequest(String),

    /// A reorder was attempted on a playlist whose order is computed by a query
    #[error("Cannot reorder query-backed playlist {0:?}")]
    ReorderConflict(String),

    /// Query text that would be read back as an id list or as empty content
    #[error("Query {0:?} would not read back as a query")]
    AmbiguousQuery(String),

    #[error("Unknown playlist: {0}")]
    UnknownPlaylist(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GrimoireError {
    /// True when the error means "no file on disk yet"
    pub fn is_not_found(&self) -> bool {
        matches!(self, GrimoireError::NotFound(_))
    }
}
