//! Turning raw inputs (file paths) into record fields

use crate::model::Fields;
use anyhow::{Context, Result};
use lofty::prelude::*;
use lofty::probe::Probe;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Record parser trait - maps an external input to record fields
///
/// Supplied by the caller of the add operations; closures with the same
/// signature implement it too.
pub trait RecordParser {
    fn parse(&self, input: &Path) -> Result<Fields>;
}

impl<F> RecordParser for F
where
    F: Fn(&Path) -> Result<Fields>,
{
    fn parse(&self, input: &Path) -> Result<Fields> {
        self(input)
    }
}

/// Records file system facts only: path, name, stem, extension and size
#[derive(Debug, Clone, Copy, Default)]
pub struct PathParser;

impl RecordParser for PathParser {
    fn parse(&self, input: &Path) -> Result<Fields> {
        let metadata = std::fs::metadata(input)
            .with_context(|| format!("Failed to read file metadata: {:?}", input))?;

        let mut fields = Fields::new();
        fields.insert("path".to_string(), Value::from(input.to_string_lossy().as_ref()));
        if let Some(name) = input.file_name() {
            fields.insert("name".to_string(), Value::from(name.to_string_lossy().as_ref()));
        }
        if let Some(stem) = input.file_stem() {
            fields.insert("stem".to_string(), Value::from(stem.to_string_lossy().as_ref()));
        }
        if let Some(ext) = input.extension() {
            fields.insert(
                "ext".to_string(),
                Value::from(ext.to_string_lossy().to_lowercase()),
            );
        }
        fields.insert("size".to_string(), Value::from(metadata.len()));
        Ok(fields)
    }
}

/// Path facts plus embedded audio tags, when the file has any
#[derive(Debug, Clone, Copy, Default)]
pub struct TagParser;

impl RecordParser for TagParser {
    fn parse(&self, input: &Path) -> Result<Fields> {
        let mut fields = PathParser.parse(input)?;

        match read_tags(input) {
            Ok(tags) => fields.extend(tags),
            Err(e) => log::debug!("No tags for {:?}: {}", input, e),
        }
        Ok(fields)
    }
}

fn read_tags(path: &Path) -> Result<Fields> {
    let tagged_file = Probe::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?
        .read()
        .with_context(|| format!("Failed to read tags from: {}", path.display()))?;

    let mut fields = Fields::new();
    let duration = tagged_file.properties().duration();
    if !duration.is_zero() {
        fields.insert("duration_ms".to_string(), Value::from(duration.as_millis() as u64));
    }

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        let text_fields = [
            ("title", tag.title()),
            ("artist", tag.artist()),
            ("album", tag.album()),
            ("genre", tag.genre()),
        ];
        for (name, value) in text_fields {
            if let Some(value) = value {
                fields.insert(name.to_string(), Value::from(value.as_ref()));
            }
        }
        if let Some(year) = tag.year() {
            fields.insert("year".to_string(), Value::from(year));
        }
        if let Some(track) = tag.track() {
            fields.insert("track".to_string(), Value::from(track));
        }
    }
    Ok(fields)
}

/// Interpret a raw input string as a path, accepting `file://` URIs
pub fn input_path(raw: &str) -> PathBuf {
    raw.strip_prefix("file://")
        .and_then(|path| urlencoding::decode(path).ok())
        .map(|decoded| PathBuf::from(decoded.into_owned()))
        .unwrap_or_else(|| PathBuf::from(raw))
}
