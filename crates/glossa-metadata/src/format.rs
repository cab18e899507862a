//! File formats and their decoders
//!
//! Each format decodes to a JSON object so flattening and span lookup are
//! shared. Front-matter documents only contribute the TOML block between the
//! `+++` fences; line numbers stay relative to the whole file.

use crate::error::ParseError;
use serde_json::{Map, Number, Value};
use std::ops::Range;

/// Fence delimiting TOML front-matter
pub const FRONT_MATTER_FENCE: &str = "+++";

/// Supported translation file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Toml,
    /// Markdown with a TOML front-matter block
    FrontMatter,
}

impl Format {
    /// All formats, in detection order
    pub const ALL: [Format; 3] = [Format::Json, Format::Toml, Format::FrontMatter];

    /// Supported file extensions (without dot)
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Json => &["json"],
            Self::Toml => &["toml"],
            Self::FrontMatter => &["md", "markdown"],
        }
    }

    /// Detect the format from a path's extension
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let (_, ext) = path.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }

    /// Whether keys are written as TOML (`key = value`)
    #[must_use]
    pub const fn is_toml(self) -> bool {
        matches!(self, Self::Toml | Self::FrontMatter)
    }
}

/// A decoded document
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub root: Map<String, Value>,
    /// Lines of the file that hold the decoded keys
    pub window: Range<usize>,
}

/// Decode `content` as `format`
///
/// # Errors
/// Returns [`ParseError`] on syntax errors, a non-object root, or an
/// unterminated front-matter block
pub fn decode(format: Format, path: &str, content: &str) -> Result<Decoded, ParseError> {
    let line_count = content.lines().count();
    match format {
        Format::Json => {
            let value: Value = serde_json::from_str(content).map_err(|e| ParseError::json(path, e))?;
            match value {
                Value::Object(root) => Ok(Decoded {
                    root,
                    window: 0..line_count,
                }),
                _ => Err(ParseError::NotAnObject { path: path.to_string() }),
            }
        }
        Format::Toml => Ok(Decoded {
            root: decode_toml(path, content)?,
            window: 0..line_count,
        }),
        Format::FrontMatter => {
            let Some(window) = front_matter_window(path, content)? else {
                return Ok(Decoded {
                    root: Map::new(),
                    window: 0..0,
                });
            };
            let block = content
                .lines()
                .skip(window.start)
                .take(window.len())
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Decoded {
                root: decode_toml(path, &block)?,
                window,
            })
        }
    }
}

/// Lines between the `+++` fences, if the document opens with one
fn front_matter_window(path: &str, content: &str) -> Result<Option<Range<usize>>, ParseError> {
    let mut lines = content.lines();
    match lines.next() {
        Some(first) if first.trim_start_matches('\u{feff}').trim() == FRONT_MATTER_FENCE => {}
        _ => return Ok(None),
    }
    let close = lines
        .position(|line| line.trim() == FRONT_MATTER_FENCE)
        .ok_or_else(|| ParseError::FrontMatter { path: path.to_string() })?;
    Ok(Some(1..close + 1))
}

fn decode_toml(path: &str, content: &str) -> Result<Map<String, Value>, ParseError> {
    let table: toml::Table = content.parse().map_err(|e| ParseError::toml(path, e))?;
    Ok(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => Number::from_f64(f).map_or_else(|| Value::String(f.to_string()), Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}
