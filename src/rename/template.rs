//! Path templates for renaming files from record fields
//!
//! A template is literal text with `{field}` placeholders, compiled once
//! and rendered for each record:
//!
//! ```text
//! {artist|slug}/{year|default(unknown)}/{track:02} - {title|trim}.{ext}
//! ```
//!
//! A placeholder is `name[:width][|filter]...`. A numeric value is
//! zero-padded to `width`. `{{` and `}}` produce literal braces. Filters
//! come from a fixed list; there is no way to run arbitrary code.

use crate::error::{GrimoireError, Result};
use crate::model::Record;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::fmt::Write;
use std::path::Path;

/// Pseudo-field holding the current local time
pub const NOW_FIELD: &str = "now";

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Lower,
    Upper,
    Trim,
    Slug,
    Stem,
    Ext,
    Parent,
    Year,
    Default(String),
    Date(String),
}

impl Filter {
    fn parse(source: &str) -> Result<Filter> {
        let source = source.trim();
        let (name, arg) = match source.find('(') {
            Some(open) if source.ends_with(')') => (&source[..open], Some(&source[open + 1..source.len() - 1])),
            Some(_) => return Err(template_error(format!("unclosed argument in filter {:?}", source))),
            None => (source, None),
        };

        let filter = match (name, arg) {
            ("lower", None) => Filter::Lower,
            ("upper", None) => Filter::Upper,
            ("trim", None) => Filter::Trim,
            ("slug", None) => Filter::Slug,
            ("stem", None) => Filter::Stem,
            ("ext", None) => Filter::Ext,
            ("parent", None) => Filter::Parent,
            ("year", None) => Filter::Year,
            ("default", Some(text)) => Filter::Default(text.to_string()),
            ("date", Some(format)) => {
                if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                    return Err(template_error(format!("invalid date format {:?}", format)));
                }
                Filter::Date(format.to_string())
            }
            _ => return Err(template_error(format!("unknown filter {:?}", source))),
        };
        Ok(filter)
    }

    fn apply(&self, value: String) -> Result<String> {
        Ok(match self {
            Filter::Lower => value.to_lowercase(),
            Filter::Upper => value.to_uppercase(),
            Filter::Trim => value.trim().to_string(),
            Filter::Slug => slug(&value),
            Filter::Stem => path_part(&value, |p| p.file_stem()),
            Filter::Ext => path_part(&value, |p| p.extension()),
            Filter::Parent => Path::new(&value)
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
            Filter::Year => first_year(&value).unwrap_or_default(),
            Filter::Default(text) => {
                if value.trim().is_empty() {
                    text.clone()
                } else {
                    value
                }
            }
            Filter::Date(format) => format_date(&value, format)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field {
        name: String,
        width: Option<usize>,
        filters: Vec<Filter>,
    },
}

/// A compiled rename template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compile a template; unknown filters and bad syntax fail here
    pub fn compile(source: &str) -> Result<Template> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut placeholder = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        placeholder.push(inner);
                    }
                    if !closed {
                        return Err(template_error("unclosed placeholder".to_string()));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(&placeholder)?);
                }
                '}' => return Err(template_error("unmatched '}'".to_string())),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Template {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field names the template reads
    pub fn fields(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Render the template for one record; missing fields are empty
    pub fn render(&self, record: &Record) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field {
                    name,
                    width,
                    filters,
                } => {
                    let mut value = if name == NOW_FIELD {
                        Local::now().to_rfc3339()
                    } else {
                        record.text(name).unwrap_or_default()
                    };
                    if let Some(width) = width {
                        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                            value = format!("{:0>width$}", value, width = width);
                        }
                    }
                    for filter in filters {
                        value = filter.apply(value)?;
                    }
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

fn parse_placeholder(placeholder: &str) -> Result<Segment> {
    let mut parts = placeholder.split('|');
    let head = parts.next().unwrap_or_default().trim();

    let (name, width) = match head.split_once(':') {
        Some((name, width)) => {
            let width = width
                .trim()
                .parse::<usize>()
                .map_err(|_| template_error(format!("invalid width in {{{}}}", placeholder)))?;
            (name.trim(), Some(width))
        }
        None => (head, None),
    };

    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(template_error(format!("invalid field name in {{{}}}", placeholder)));
    }

    let filters = parts.map(Filter::parse).collect::<Result<Vec<_>>>()?;
    Ok(Segment::Field {
        name: name.to_string(),
        width,
        filters,
    })
}

fn template_error(message: String) -> GrimoireError {
    GrimoireError::Template(message)
}

/// Replace characters that are unsafe in a single path component
fn slug(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string()
}

fn path_part(value: &str, part: impl Fn(&Path) -> Option<&std::ffi::OsStr>) -> String {
    part(Path::new(value))
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn first_year(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    (0..bytes.len().saturating_sub(3))
        .find(|&i| bytes[i..i + 4].iter().all(u8::is_ascii_digit))
        .map(|i| value[i..i + 4].to_string())
}

fn format_date(value: &str, format: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(String::new());
    }

    let datetime: NaiveDateTime = if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        dt.naive_local()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        dt
    } else if let Some(dt) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        dt
    } else {
        log::debug!("Not a date: {:?}", value);
        return Ok(String::new());
    };

    let mut out = String::new();
    write!(out, "{}", datetime.format(format))
        .map_err(|_| template_error(format!("cannot format date with {:?}", format)))?;
    Ok(out)
}
