//! A single playlist backed by one file in the playlist directory

use super::format;
use crate::error::{GrimoireError, Result};
use crate::model::{Content, PlaylistMeta, RecordId};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A named, ordered reference to records in one database partition
///
/// Metadata and content are loaded independently and on demand, so a
/// playlist can be listed without reading its content. A playlist created
/// in memory has no file until [`Playlist::save`] is called.
#[derive(Debug, Clone)]
pub struct Playlist {
    /// File name inside the playlist directory, fixed for the playlist's life
    basename: String,

    /// Full path of the backing file
    path: PathBuf,

    /// Tokens checked when classifying stored content
    check_at_least: usize,

    /// Loaded (or newly assigned) metadata
    meta: Option<PlaylistMeta>,

    /// Loaded (or newly assigned) content
    content: Option<Content>,

    /// Whether a file exists for this playlist
    saved: bool,
}

impl Playlist {
    /// Create a new playlist in memory, without touching the disk
    pub fn create(dir: &Path, basename: &str, meta: PlaylistMeta, check_at_least: usize) -> Self {
        Self {
            basename: basename.to_string(),
            path: dir.join(basename),
            check_at_least,
            meta: Some(meta),
            content: Some(Content::Empty),
            saved: false,
        }
    }

    /// Refer to an existing playlist file; nothing is read yet
    pub fn open(dir: &Path, basename: &str, check_at_least: usize) -> Self {
        Self {
            basename: basename.to_string(),
            path: dir.join(basename),
            check_at_least,
            meta: None,
            content: None,
            saved: true,
        }
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the playlist has been written to disk
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Whether the content is currently held in memory
    pub fn is_content_loaded(&self) -> bool {
        self.content.is_some()
    }

    /// Metadata, if already loaded
    pub fn meta(&self) -> Option<&PlaylistMeta> {
        self.meta.as_ref()
    }

    /// Content, if already loaded
    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    /// Load metadata from disk unless already in memory
    pub fn load_metadata(&mut self) -> Result<&PlaylistMeta> {
        let meta = match self.meta.take() {
            Some(meta) => meta,
            None => format::read_metadata(&self.path)?,
        };
        Ok(self.meta.insert(meta))
    }

    /// Load content from disk unless already in memory
    ///
    /// A playlist that was never saved has empty content.
    pub fn load_content(&mut self) -> Result<&Content> {
        let content = match self.content.take() {
            Some(content) => content,
            None if !self.saved => Content::Empty,
            None => {
                let (meta, content) = format::read_full(&self.path, self.check_at_least)?;
                if self.meta.is_none() {
                    self.meta = Some(meta);
                }
                content
            }
        };
        Ok(self.content.insert(content))
    }

    /// Discard in-memory state and read everything back from disk
    ///
    /// On failure (including a version mismatch) the in-memory state is
    /// left as it was.
    pub fn reload(&mut self) -> Result<()> {
        let (meta, content) = format::read_full(&self.path, self.check_at_least)?;
        self.meta = Some(meta);
        self.content = Some(content);
        self.saved = true;
        Ok(())
    }

    pub fn screen_name(&mut self) -> Result<&str> {
        Ok(&self.load_metadata()?.screen_name)
    }

    pub fn order(&mut self) -> Result<&str> {
        Ok(&self.load_metadata()?.order)
    }

    pub fn database(&mut self) -> Result<&str> {
        Ok(&self.load_metadata()?.database)
    }

    pub fn set_screen_name(&mut self, screen_name: impl Into<String>) -> Result<()> {
        self.load_metadata()?;
        if let Some(meta) = self.meta.as_mut() {
            meta.screen_name = screen_name.into();
        }
        Ok(())
    }

    pub fn set_order(&mut self, order: impl Into<String>) -> Result<()> {
        self.load_metadata()?;
        if let Some(meta) = self.meta.as_mut() {
            meta.order = order.into();
        }
        Ok(())
    }

    pub fn set_database(&mut self, database: impl Into<String>) -> Result<()> {
        self.load_metadata()?;
        if let Some(meta) = self.meta.as_mut() {
            meta.database = database.into();
        }
        Ok(())
    }

    /// Replace the content descriptor
    pub fn set_content(&mut self, content: Content) {
        self.content = Some(content);
    }

    /// Make this an identifier-list playlist, discarding any query
    pub fn set_ids(&mut self, ids: Vec<RecordId>) {
        self.set_content(Content::Ids(ids));
    }

    /// Make this a query-backed playlist, discarding any identifiers
    ///
    /// Text that the content heuristic would classify as an id list (or
    /// as empty) is refused with nothing changed.
    pub fn set_query(&mut self, query: impl Into<String>) -> Result<()> {
        let query = query.into();
        if !Content::classify(&query, self.check_at_least).is_query() {
            return Err(GrimoireError::AmbiguousQuery(query));
        }
        self.set_content(Content::Query(query));
        Ok(())
    }

    /// Append identifiers to an identifier-list (or empty) playlist
    ///
    /// Returns `false` without changes for a query-backed playlist.
    pub fn append_ids(&mut self, new_ids: &[RecordId]) -> Result<bool> {
        let mut ids = match self.load_content()? {
            Content::Query(_) => return Ok(false),
            Content::Empty => Vec::new(),
            Content::Ids(ids) => ids.clone(),
        };
        for id in new_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        self.set_ids(ids);
        Ok(true)
    }

    /// Write metadata and content to disk
    pub fn save(&mut self) -> Result<()> {
        self.load_metadata()?;
        self.load_content()?;
        if let (Some(meta), Some(content)) = (&self.meta, &self.content) {
            format::write(&self.path, meta, content)?;
            self.saved = true;
            log::info!("Saved playlist '{}' ({:?})", meta.screen_name, self.path);
        }
        Ok(())
    }

    /// Drop the in-memory content to bound memory use; metadata stays
    ///
    /// Unsaved content changes are lost.
    pub fn close(&mut self) {
        if self.saved {
            self.content = None;
        }
    }

    /// Remove the backing file, if any
    pub fn delete_file(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => log::info!("Deleted playlist file {:?}", self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("Playlist file {:?} already absent", self.path)
            }
            Err(e) => return Err(GrimoireError::Io(e)),
        }
        self.saved = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn ids(raw: &[u64]) -> Vec<RecordId> {
        raw.iter().copied().map(RecordId).collect()
    }

    #[test]
    fn test_created_playlist_has_no_file() {
        let dir = TempDir::new().unwrap();
        let mut playlist =
            Playlist::create(dir.path(), "p1", PlaylistMeta::new("New", "1", "music"), 5);

        assert!(!playlist.is_saved());
        assert!(!playlist.path().exists());
        assert_eq!(playlist.load_content().unwrap(), &Content::Empty);

        playlist.save().unwrap();
        assert!(playlist.is_saved());
        assert!(playlist.path().exists());
    }

    #[test]
    fn test_lazy_metadata_then_content() {
        let dir = TempDir::new().unwrap();
        let mut created =
            Playlist::create(dir.path(), "p1", PlaylistMeta::new("Mix", "2", "music"), 5);
        created.set_ids(ids(&[3, 1, 2]));
        created.save().unwrap();

        let mut opened = Playlist::open(dir.path(), "p1", 5);
        assert_eq!(opened.screen_name().unwrap(), "Mix");
        assert!(!opened.is_content_loaded());

        assert_eq!(opened.load_content().unwrap(), &Content::Ids(ids(&[3, 1, 2])));
        opened.close();
        assert!(!opened.is_content_loaded());
        assert_eq!(opened.database().unwrap(), "music");
    }

    #[test]
    fn test_assigning_query_discards_ids() {
        let dir = TempDir::new().unwrap();
        let mut playlist =
            Playlist::create(dir.path(), "p1", PlaylistMeta::new("Mix", "2", "music"), 5);
        playlist.set_ids(ids(&[1, 2]));
        playlist.set_query("MATCH (n) RETURN n").unwrap();
        assert_eq!(
            playlist.content(),
            Some(&Content::Query("MATCH (n) RETURN n".to_string()))
        );
        assert!(!playlist.append_ids(&ids(&[5])).unwrap());
    }

    #[test]
    fn test_numeric_query_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut playlist =
            Playlist::create(dir.path(), "p1", PlaylistMeta::new("Mix", "2", "music"), 5);
        playlist.set_ids(ids(&[4]));

        for text in ["10 22", ""] {
            let err = playlist.set_query(text).unwrap_err();
            assert!(matches!(err, GrimoireError::AmbiguousQuery(_)));
        }
        assert_eq!(playlist.content(), Some(&Content::Ids(ids(&[4]))));

        // The same text passes once a later token is checked
        playlist.set_query("10 22 abc").unwrap();
        playlist.save().unwrap();
        let mut opened = Playlist::open(dir.path(), "p1", 5);
        assert_eq!(
            opened.load_content().unwrap(),
            &Content::Query("10 22 abc".to_string())
        );
    }

    #[test]
    fn test_append_ids_skips_duplicates() {
        let dir = TempDir::new().unwrap();
        let mut playlist =
            Playlist::create(dir.path(), "p1", PlaylistMeta::new("Mix", "2", "music"), 5);
        playlist.set_ids(ids(&[1, 2]));
        assert!(playlist.append_ids(&ids(&[2, 3])).unwrap());
        assert_eq!(playlist.content().and_then(Content::ids), Some(&ids(&[1, 2, 3])[..]));
    }

    #[test]
    fn test_reload_version_mismatch_keeps_state() {
        let dir = TempDir::new().unwrap();
        let mut playlist =
            Playlist::create(dir.path(), "p1", PlaylistMeta::new("Keep", "1", "music"), 5);
        playlist.set_ids(ids(&[7]));
        playlist.save().unwrap();

        fs::write(playlist.path(), "grimoire-playlist 99\nOther\n2\nx\n8").unwrap();
        let err = playlist.reload().unwrap_err();
        assert!(matches!(err, GrimoireError::VersionMismatch { .. }));
        assert_eq!(playlist.meta().map(|m| m.screen_name.as_str()), Some("Keep"));
        assert_eq!(playlist.content(), Some(&Content::Ids(ids(&[7]))));
    }
}
