//! Playlist persistence
//!
//! Each playlist is one small text file in the playlist directory. The
//! manager owns the collection and keeps the default playlist alive.

pub mod format;
mod manager;
mod stored;

pub use format::FORMAT_VERSION;
pub use manager::{PlaylistManager, DEFAULT_BASENAME, DEFAULT_ORDER, DEFAULT_SCREEN_NAME};
pub use stored::Playlist;
