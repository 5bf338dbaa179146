//! Collection of playlists for one application instance

use super::stored::Playlist;
use crate::config::GrimoireConfig;
use crate::error::{GrimoireError, Result};
use crate::model::PlaylistMeta;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Basename of the playlist that always exists
pub const DEFAULT_BASENAME: &str = "default";

/// Screen name given to a recreated default playlist
pub const DEFAULT_SCREEN_NAME: &str = "Default";

/// Sort order given to a recreated default playlist
pub const DEFAULT_ORDER: &str = "0";

/// Owns every playlist in the playlist directory
///
/// The collection is one-to-one with the files found in the directory,
/// plus playlists created in memory and not saved yet. A playlist with
/// basename [`DEFAULT_BASENAME`] is always present.
#[derive(Debug)]
pub struct PlaylistManager {
    /// Directory holding one file per playlist
    dir: PathBuf,

    /// Database partition for new playlists
    default_database: String,

    /// Tokens checked when classifying stored content
    check_at_least: usize,

    /// All playlists, default first after initialization
    playlists: Vec<Playlist>,

    /// Basename of the active playlist, resolved on demand
    current: Option<String>,
}

impl PlaylistManager {
    /// Create a manager without scanning the directory
    pub fn new(dir: PathBuf, default_database: &str, check_at_least: usize) -> Self {
        let mut manager = Self {
            dir,
            default_database: default_database.to_string(),
            check_at_least,
            playlists: Vec::new(),
            current: None,
        };
        manager.ensure_default();
        manager
    }

    /// Create a manager and populate it from the playlist directory
    pub fn open(dir: PathBuf, default_database: &str, check_at_least: usize) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        let mut manager = Self::new(dir, default_database, check_at_least);
        manager.rescan()?;
        Ok(manager)
    }

    /// Create a manager from the application configuration
    pub fn from_config(config: &GrimoireConfig) -> Result<Self> {
        Self::open(
            config.playlist_dir.clone(),
            &config.default_database,
            config.check_at_least,
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rebuild the collection from the files in the playlist directory
    ///
    /// Playlists already known keep their loaded state. Unsaved playlists
    /// are dropped, and the default playlist is recreated if needed.
    pub fn rescan(&mut self) -> Result<()> {
        let mut previous = std::mem::take(&mut self.playlists);
        let mut scanned = Vec::new();

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| GrimoireError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let basename = entry.file_name().to_string_lossy().to_string();

            let playlist = match previous.iter().position(|p| p.basename() == basename) {
                Some(index) => previous.swap_remove(index),
                None => Playlist::open(&self.dir, &basename, self.check_at_least),
            };
            scanned.push(playlist);
        }

        for dropped in previous.iter().filter(|p| !p.is_saved()) {
            log::debug!("Dropping unsaved playlist {}", dropped.basename());
        }

        self.playlists = scanned;
        self.ensure_default();

        log::info!(
            "Scanned {} playlists from {:?}",
            self.playlists.len(),
            self.dir
        );
        Ok(())
    }

    /// Return the default playlist, recreating it if absent
    pub fn ensure_default(&mut self) -> &mut Playlist {
        let index = match self.position(DEFAULT_BASENAME) {
            Some(index) => index,
            None => {
                log::debug!("Creating default playlist");
                let meta = PlaylistMeta::new(
                    DEFAULT_SCREEN_NAME,
                    DEFAULT_ORDER,
                    self.default_database.clone(),
                );
                let playlist =
                    Playlist::create(&self.dir, DEFAULT_BASENAME, meta, self.check_at_least);
                self.playlists.insert(0, playlist);
                0
            }
        };
        &mut self.playlists[index]
    }

    /// All playlists, in collection order
    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    pub fn contains(&self, basename: &str) -> bool {
        self.position(basename).is_some()
    }

    /// Get a playlist by basename
    pub fn get(&self, basename: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.basename() == basename)
    }

    /// Get a mutable playlist by basename
    pub fn get_mut(&mut self, basename: &str) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|p| p.basename() == basename)
    }

    /// Get a mutable playlist by basename, failing if it is unknown
    pub fn require_mut(&mut self, basename: &str) -> Result<&mut Playlist> {
        self.get_mut(basename)
            .ok_or_else(|| GrimoireError::UnknownPlaylist(basename.to_string()))
    }

    /// Create a new in-memory playlist in the default database
    pub fn create(&mut self, screen_name: &str, order: &str) -> &mut Playlist {
        let database = self.default_database.clone();
        self.create_in(screen_name, order, &database)
    }

    /// Create a new in-memory playlist in the given database
    pub fn create_in(&mut self, screen_name: &str, order: &str, database: &str) -> &mut Playlist {
        let basename = self.unique_basename();
        log::info!("Creating playlist '{}' as {}", screen_name, basename);

        let meta = PlaylistMeta::new(screen_name, order, database);
        self.playlists
            .push(Playlist::create(&self.dir, &basename, meta, self.check_at_least));
        let last = self.playlists.len() - 1;
        &mut self.playlists[last]
    }

    /// Delete playlists and their files; the default playlist is recreated
    ///
    /// Returns the number of playlists removed from the collection.
    pub fn delete(&mut self, basenames: &[&str]) -> Result<usize> {
        let mut removed = 0;
        let mut outcome = Ok(());
        for basename in basenames {
            if let Some(index) = self.position(basename) {
                let mut playlist = self.playlists.remove(index);
                removed += 1;
                if let Err(e) = playlist.delete_file() {
                    log::error!("Failed to delete playlist file {:?}: {}", playlist.path(), e);
                    outcome = Err(e);
                    break;
                }
            } else {
                log::warn!("Cannot delete unknown playlist {}", basename);
            }
        }
        // Runs on the error path too
        self.ensure_default();
        outcome.map(|()| removed)
    }

    /// Basenames ordered by sort order, then basename
    ///
    /// Numeric orders come first and compare by value; other orders
    /// follow and compare as text.
    ///
    /// Loads metadata as needed; playlists whose metadata cannot be read
    /// are logged and placed last.
    pub fn sorted_basenames(&mut self) -> Vec<String> {
        let mut keyed: Vec<(Option<String>, String)> = Vec::with_capacity(self.playlists.len());
        for playlist in self.playlists.iter_mut() {
            let order = match playlist.order() {
                Ok(order) => Some(order.to_string()),
                Err(e) => {
                    log::warn!("Cannot read playlist {}: {}", playlist.basename(), e);
                    None
                }
            };
            keyed.push((order, playlist.basename().to_string()));
        }

        keyed.sort_by(|a, b| match (&a.0, &b.0) {
            (Some(x), Some(y)) => compare_order(x, y).then_with(|| a.1.cmp(&b.1)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.1.cmp(&b.1),
        });
        keyed.into_iter().map(|(_, basename)| basename).collect()
    }

    /// Mark a playlist as active, or clear the selection with `None`
    pub fn set_current(&mut self, basename: Option<&str>) -> Result<()> {
        if let Some(basename) = basename {
            if !self.contains(basename) {
                return Err(GrimoireError::UnknownPlaylist(basename.to_string()));
            }
        }
        self.current = basename.map(str::to_string);
        Ok(())
    }

    /// Basename of the active playlist, falling back to the default
    pub fn current_basename(&self) -> &str {
        match self.current.as_deref() {
            Some(basename) if self.contains(basename) => basename,
            _ => DEFAULT_BASENAME,
        }
    }

    /// The active playlist, falling back to the default playlist
    pub fn current(&mut self) -> &mut Playlist {
        let index = self
            .current
            .as_deref()
            .and_then(|basename| self.position(basename));
        match index {
            Some(index) => &mut self.playlists[index],
            None => self.ensure_default(),
        }
    }

    /// Drop the in-memory content of every saved playlist
    pub fn close_all(&mut self) {
        for playlist in self.playlists.iter_mut() {
            playlist.close();
        }
    }

    fn position(&self, basename: &str) -> Option<usize> {
        self.playlists.iter().position(|p| p.basename() == basename)
    }

    fn unique_basename(&self) -> String {
        let mut n = self.playlists.len();
        loop {
            let candidate = format!("playlist-{}", n);
            if !self.contains(&candidate) && !self.dir.join(&candidate).exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

fn compare_order(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Content, RecordId};
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> PlaylistManager {
        PlaylistManager::open(dir.path().to_path_buf(), "music", 5).unwrap()
    }

    fn default_count(manager: &PlaylistManager) -> usize {
        manager
            .playlists()
            .iter()
            .filter(|p| p.basename() == DEFAULT_BASENAME)
            .count()
    }

    #[test]
    fn test_open_creates_default() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        assert_eq!(manager.len(), 1);

        let default = manager.ensure_default();
        assert_eq!(default.basename(), DEFAULT_BASENAME);
        assert_eq!(default.screen_name().unwrap(), DEFAULT_SCREEN_NAME);
        assert_eq!(default.database().unwrap(), "music");
        assert_eq!(default.load_content().unwrap(), &Content::Empty);
    }

    #[test]
    fn test_ensure_default_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        manager.ensure_default();
        manager.ensure_default();
        assert_eq!(default_count(&manager), 1);
        assert_eq!(manager.playlists()[0].basename(), DEFAULT_BASENAME);
    }

    #[test]
    fn test_delete_everything_keeps_default() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        manager.ensure_default().save().unwrap();
        let a = manager.create("A", "1").basename().to_string();
        let b = manager.create("B", "2").basename().to_string();

        let removed = manager.delete(&[DEFAULT_BASENAME, a.as_str(), b.as_str()]).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(manager.len(), 1);
        assert_eq!(default_count(&manager), 1);
        assert!(!dir.path().join(DEFAULT_BASENAME).exists());
    }

    #[test]
    fn test_rescan_finds_saved_playlists_only() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        {
            let saved = manager.create("Saved", "1");
            saved.set_ids(vec![RecordId(1), RecordId(2)]);
            saved.save().unwrap();
        }
        manager.create("Unsaved", "2");
        assert_eq!(manager.len(), 3);

        manager.rescan().unwrap();
        assert_eq!(manager.len(), 2);

        let mut reopened = PlaylistManager::open(dir.path().to_path_buf(), "music", 5).unwrap();
        let names: Vec<String> = reopened
            .sorted_basenames()
            .into_iter()
            .filter_map(|b| {
                reopened
                    .get_mut(&b)
                    .and_then(|p| p.screen_name().ok().map(str::to_string))
            })
            .collect();
        assert_eq!(names, vec!["Default".to_string(), "Saved".to_string()]);
    }

    #[test]
    fn test_numeric_orders_sort_as_numbers() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        let ten = manager.create("Ten", "10").basename().to_string();
        let two = manager.create("Two", "2").basename().to_string();
        let named = manager.create("Named", "b-side").basename().to_string();

        assert_eq!(
            manager.sorted_basenames(),
            vec![DEFAULT_BASENAME.to_string(), two, ten, named]
        );
    }

    #[test]
    fn test_unique_basenames() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        let a = manager.create("A", "1").basename().to_string();
        let b = manager.create("B", "1").basename().to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_current_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        assert_eq!(manager.current().basename(), DEFAULT_BASENAME);

        let a = manager.create("A", "1").basename().to_string();
        manager.set_current(Some(&a)).unwrap();
        assert_eq!(manager.current_basename(), a);

        manager.delete(&[a.as_str()]).unwrap();
        assert_eq!(manager.current().basename(), DEFAULT_BASENAME);
        assert!(manager.set_current(Some("nope")).is_err());
    }
}
