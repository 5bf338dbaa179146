//! Playlist file format
//!
//! A playlist file is plain text, one field per line, in fixed order:
//!
//! ```text
//! grimoire-playlist 1     <- format version
//! Road trip               <- screen name
//! 3                       <- sort order
//! music                   <- database partition
//! 10 22 7                 <- content (ids or a query)
//! ```
//!
//! Metadata reads stop after the fourth line so a playlist can be listed
//! without pulling its content.

use crate::error::{GrimoireError, Result};
use crate::model::{Content, PlaylistMeta};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

/// The only playlist format version this crate reads and writes
pub const FORMAT_VERSION: &str = "grimoire-playlist 1";

const METADATA_LINES: usize = 4;
const FULL_LINES: usize = 5;

/// Serialize a playlist to its stored text form
pub fn to_text(meta: &PlaylistMeta, content: &Content) -> String {
    [
        FORMAT_VERSION.to_string(),
        single_line(&meta.screen_name),
        single_line(&meta.order),
        single_line(&meta.database),
        single_line(&content.to_text()),
    ]
    .join("\n")
}

/// Fields are line-delimited, so embedded line breaks become spaces
fn single_line(field: &str) -> String {
    field.replace(['\r', '\n'], " ")
}

/// Parse metadata from the leading lines of a playlist file
pub fn parse_metadata(lines: &[String]) -> Result<PlaylistMeta> {
    let field = |i: usize| lines.get(i).cloned().unwrap_or_default();

    let version = field(0);
    if version != FORMAT_VERSION {
        return Err(GrimoireError::VersionMismatch {
            found: version,
            expected: FORMAT_VERSION.to_string(),
        });
    }

    Ok(PlaylistMeta {
        screen_name: field(1),
        order: field(2),
        database: field(3),
    })
}

/// Parse metadata and content from the lines of a playlist file
pub fn parse_full(lines: &[String], check_at_least: usize) -> Result<(PlaylistMeta, Content)> {
    let meta = parse_metadata(lines)?;
    let content = lines
        .get(METADATA_LINES)
        .map(|text| Content::classify(text, check_at_least))
        .unwrap_or_default();
    Ok((meta, content))
}

/// Read only the playlist metadata from disk
pub fn read_metadata(path: &Path) -> Result<PlaylistMeta> {
    let lines = read_lines(path, METADATA_LINES)?;
    parse_metadata(&lines)
}

/// Read the full playlist from disk
pub fn read_full(path: &Path, check_at_least: usize) -> Result<(PlaylistMeta, Content)> {
    let lines = read_lines(path, FULL_LINES)?;
    parse_full(&lines, check_at_least)
}

/// Write a playlist to disk, creating the parent directory if needed
pub fn write(path: &Path, meta: &PlaylistMeta, content: &Content) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_text(meta, content))?;
    log::debug!("Wrote playlist file {:?}", path);
    Ok(())
}

/// Read at most `count` lines, mapping a missing file to `NotFound`
fn read_lines(path: &Path, count: usize) -> Result<Vec<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(GrimoireError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut lines = Vec::with_capacity(count);
    for line in BufReader::new(file).lines().take(count) {
        let mut line = line?;
        if line.ends_with('\r') {
            line.pop();
        }
        lines.push(line);
    }
    Ok(lines)
}
