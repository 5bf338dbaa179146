use serde::{Deserialize, Serialize};

/// Playlist metadata stored in the first lines of a playlist file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistMeta {
    /// Display name
    pub screen_name: String,

    /// Sort key among sibling playlists (opaque, compared as text)
    pub order: String,

    /// Database partition the playlist's records live in
    pub database: String,
}

impl PlaylistMeta {
    pub fn new(
        screen_name: impl Into<String>,
        order: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            screen_name: screen_name.into(),
            order: order.into(),
            database: database.into(),
        }
    }
}
