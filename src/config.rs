//! Application configuration

use crate::model::CHECK_AT_LEAST;
use std::path::PathBuf;

/// Default location of the playlist directory
pub const DEFAULT_PLAYLIST_DIR: &str = "~/.local/share/grimoire/playlists";

/// Default location of the store file
pub const DEFAULT_STORE_PATH: &str = "~/.local/share/grimoire/store.json";

/// Database partition used when none is given
pub const DEFAULT_DATABASE: &str = "default";

/// Configuration for a Grimoire session
#[derive(Debug, Clone)]
pub struct GrimoireConfig {
    /// Directory holding one file per playlist
    pub playlist_dir: PathBuf,

    /// JSON file backing the record store
    pub store_path: PathBuf,

    /// Database partition for new playlists (and the default playlist)
    pub default_database: String,

    /// Number of leading content tokens checked when classifying content
    pub check_at_least: usize,

    /// Ask before removing records from the store or deleting files
    pub confirm_destructive: bool,
}

impl GrimoireConfig {
    /// Create a configuration rooted at the given directories
    pub fn new(playlist_dir: PathBuf, store_path: PathBuf) -> Self {
        Self {
            playlist_dir,
            store_path,
            default_database: DEFAULT_DATABASE.to_string(),
            check_at_least: CHECK_AT_LEAST,
            confirm_destructive: true,
        }
    }

    /// Create a configuration from user-facing path strings, expanding `~`
    pub fn from_paths(playlist_dir: &str, store_path: &str) -> Self {
        Self::new(
            PathBuf::from(shellexpand::tilde(playlist_dir).as_ref()),
            PathBuf::from(shellexpand::tilde(store_path).as_ref()),
        )
    }

    /// Set the database partition for new playlists
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.default_database = database.into();
        self
    }

    /// Set how many content tokens are checked when classifying content
    pub fn with_check_at_least(mut self, check_at_least: usize) -> Self {
        self.check_at_least = check_at_least.max(1);
        self
    }

    /// Skip confirmation of destructive removals
    pub fn without_confirmation(mut self) -> Self {
        self.confirm_destructive = false;
        self
    }
}

impl Default for GrimoireConfig {
    fn default() -> Self {
        Self::from_paths(DEFAULT_PLAYLIST_DIR, DEFAULT_STORE_PATH)
    }
}
