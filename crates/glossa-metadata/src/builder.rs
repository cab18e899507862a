//! Raw file to per-key metadata

use crate::error::ParseError;
use crate::flatten::flatten;
use crate::format::{decode, Format};
use crate::locate::SpanLocator;
use glossa_core::{file_hash, Blame, CharRange, KeyMetadata, SourceHash};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Flattened values and per-key metadata of one file at one revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub values: BTreeMap<String, String>,
    /// Sorted by key
    pub keys: Vec<KeyMetadata>,
    /// Hash over all values, used as the payload-level hash
    pub source_hash: SourceHash,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self::from_values(BTreeMap::new())
    }
}

impl FileMetadata {
    /// Metadata with values only (zero spans, no blame)
    #[must_use]
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        let keys = values
            .iter()
            .map(|(key, value)| KeyMetadata {
                key: key.clone(),
                char_range: CharRange::default(),
                blame: None,
                source_hash: SourceHash::of(value),
            })
            .collect();
        let source_hash = file_hash(&values);
        Self {
            values,
            keys,
            source_hash,
        }
    }

    /// Metadata for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&KeyMetadata> {
        self.keys
            .binary_search_by(|meta| meta.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.keys[i])
    }

    /// Current source hash of every key
    #[must_use]
    pub fn hashes(&self) -> HashMap<String, SourceHash> {
        self.keys
            .iter()
            .map(|meta| (meta.key.clone(), meta.source_hash))
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Build metadata, degrading to empty metadata on unparsable content
///
/// Never fails: a broken file must not abort the sync it is part of.
#[must_use]
pub fn build(path: &str, content: &str, blame: Option<&Blame>) -> FileMetadata {
    match try_build(path, content, blame) {
        Ok(metadata) => metadata,
        Err(err) => {
            tracing::warn!(path, error = %err, "unparsable translation file, no keys extracted");
            FileMetadata::default()
        }
    }
}

/// Build metadata for `content` read from `path`
///
/// `blame` is the most recent commit touching the file and is attached to
/// every key.
///
/// # Errors
/// Returns [`ParseError`] if the extension is unsupported or the content does
/// not decode to an object
pub fn try_build(path: &str, content: &str, blame: Option<&Blame>) -> Result<FileMetadata, ParseError> {
    let format = Format::from_path(path).ok_or_else(|| {
        ParseError::UnsupportedExtension(path.rsplit_once('.').map_or_else(String::new, |(_, ext)| ext.to_string()))
    })?;
    let decoded = decode(format, path, content)?;
    let values = flatten(&decoded.root);

    let mut locator = SpanLocator::new(content, format, decoded.window);
    let keys = values
        .iter()
        .map(|(key, value)| KeyMetadata {
            key: key.clone(),
            char_range: locator.locate(key),
            blame: blame.cloned(),
            source_hash: SourceHash::of(value),
        })
        .collect();

    tracing::debug!(path, keys = values.len(), "built file metadata");
    let source_hash = file_hash(&values);
    Ok(FileMetadata {
        values,
        keys,
        source_hash,
    })
}
