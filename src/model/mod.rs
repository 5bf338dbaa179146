//! Data model for playlists and store records
//!
//! These types are independent of both the playlist file format and
//! the backing store implementation.

mod content;
mod playlist;
mod record;

pub use content::{Content, CHECK_AT_LEAST};
pub use playlist::PlaylistMeta;
pub use record::{value_text, Fields, Record, RecordId};
