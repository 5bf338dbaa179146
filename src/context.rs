//! Application context passed to every handler

use crate::config::GrimoireConfig;
use crate::error::{GrimoireError, Result};
use crate::playlist::PlaylistManager;
use crate::store::{Connection, GraphStore, MemoryStore};
use crate::view::PlaylistView;

/// Everything one Grimoire session needs
///
/// Built once at startup and shut down explicitly; there is no global
/// state. Fields are public so handlers can borrow the manager and the
/// connection at the same time.
pub struct AppContext {
    pub config: GrimoireConfig,
    pub playlists: PlaylistManager,
    pub connection: Connection,
}

impl AppContext {
    /// Open the playlist directory and the JSON store named in `config`
    pub fn open(config: GrimoireConfig) -> Result<Self> {
        let store = MemoryStore::open(&config.store_path)
            .map_err(|e| GrimoireError::StoreUnavailable(e.to_string()))?;
        Self::with_store(config, store)
    }

    /// Open the playlist directory with a caller-supplied store
    pub fn with_store(config: GrimoireConfig, store: impl GraphStore + 'static) -> Result<Self> {
        let playlists = PlaylistManager::from_config(&config)?;
        log::info!(
            "Session opened: {} playlists in {:?}",
            playlists.len(),
            config.playlist_dir
        );
        Ok(Self {
            config,
            playlists,
            connection: Connection::new(store),
        })
    }

    /// Materialize a playlist by basename
    pub fn view(&mut self, basename: &str) -> Result<PlaylistView> {
        PlaylistView::materialize(&mut self.playlists, &mut self.connection, basename)
    }

    /// Materialize the active playlist (the default one if none is set)
    pub fn current_view(&mut self) -> Result<PlaylistView> {
        let basename = self.playlists.current_basename().to_string();
        self.view(&basename)
    }

    /// Flush the store and release playlist content
    pub fn shutdown(mut self) -> Result<()> {
        self.playlists.close_all();
        self.connection.flush()?;
        log::info!("Session closed");
        Ok(())
    }
}
