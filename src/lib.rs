//! Grimoire - playlist core of a media catalogue
//!
//! Playlists are small text files naming records in a graph store, either
//! by explicit id list or by query. This library loads and saves them,
//! materializes them as ordered tables, and writes reorders and edits back.

pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod playlist;
pub mod records;
pub mod rename;
pub mod store;
pub mod table;
pub mod view;

pub use config::GrimoireConfig;
pub use context::AppContext;
pub use error::{GrimoireError, Result};
pub use playlist::{Playlist, PlaylistManager};
pub use view::PlaylistView;
