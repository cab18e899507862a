//! Per-key metadata types shared by the builder, cache and service layers.

use crate::hash::SourceHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Zero-based line/column position (columns count characters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[inline]
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Span of a key and its value in the raw file text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CharRange {
    pub start: Position,
    pub end: Position,
}

impl CharRange {
    #[inline]
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Range on a single line
    #[inline]
    #[must_use]
    pub const fn on_line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            start: Position::new(line, start_col),
            end: Position::new(line, end_col),
        }
    }

    /// True when the range covers nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Authorship of a file revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blame {
    pub revision_id: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
}

/// Metadata for one flattened key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    pub key: String,
    pub char_range: CharRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blame: Option<Blame>,
    pub source_hash: SourceHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_metadata_json_uses_camel_case() {
        let meta = KeyMetadata {
            key: "a.b".to_string(),
            char_range: CharRange::on_line(2, 4, 17),
            blame: None,
            source_hash: SourceHash::of("value"),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("charRange").is_some());
        assert!(json.get("sourceHash").is_some());
        assert!(json.get("blame").is_none());
    }

    #[test]
    fn char_range_empty() {
        assert!(CharRange::default().is_empty());
        assert!(!CharRange::on_line(0, 1, 3).is_empty());
    }
}
