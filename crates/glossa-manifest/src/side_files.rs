//! Progress and store side files
//!
//! Each language has two auxiliary newline-delimited files next to the
//! manifest:
//!
//! - **progress**: which keys of each physical file are translated
//! - **store**: full source key/value snapshots
//!
//! Both accept a whole-file record (`type: file`) or a partial record
//! (`type: chunk`). The shape is resolved once, here; consumers only see the
//! merged [`ProgressIndex`] / [`SourceStore`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder for the language segment in side-file paths
pub const LANG_PLACEHOLDER: &str = "{lang}";

/// Substitute the language into a `{lang}` path
#[must_use]
pub fn resolve_placeholder(filepath: &str, language: &str) -> String {
    filepath.replace(LANG_PLACEHOLDER, language)
}

/// One line of a progress file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressRecord {
    #[serde(rename_all = "camelCase")]
    File { filepath: String, keys: Vec<String> },
    #[serde(rename_all = "camelCase")]
    Chunk {
        filepath: String,
        chunk_index: u32,
        total_chunks: u32,
        keys: Vec<String>,
    },
}

/// One line of a store file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreRecord {
    #[serde(rename_all = "camelCase")]
    File {
        filepath: String,
        entries: BTreeMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    Chunk {
        filepath: String,
        chunk_index: u32,
        total_chunks: u32,
        entries: BTreeMap<String, String>,
    },
}

/// Translated keys per physical filepath
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressIndex {
    files: BTreeMap<String, BTreeSet<String>>,
}

impl ProgressIndex {
    /// Translated keys of one file
    #[must_use]
    pub fn keys(&self, filepath: &str) -> Option<&BTreeSet<String>> {
        self.files.get(filepath)
    }

    #[must_use]
    pub fn is_translated(&self, filepath: &str, key: &str) -> bool {
        self.files.get(filepath).is_some_and(|k| k.contains(key))
    }

    /// Iterate `(filepath, keys)` in path order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.files.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Source snapshots per physical filepath
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStore {
    files: BTreeMap<String, BTreeMap<String, String>>,
}

impl SourceStore {
    #[must_use]
    pub fn entries(&self, filepath: &str) -> Option<&BTreeMap<String, String>> {
        self.files.get(filepath)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.files.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn decode_lines<T: for<'de> Deserialize<'de>>(content: &str, kind: &'static str) -> Vec<T> {
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str::<T>(line) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(line = idx + 1, error = %err, kind, "skipping malformed side-file record");
                None
            }
        })
        .collect()
}

/// Parse and merge a progress file
///
/// Keys from every record of a filepath are unioned.
#[must_use]
pub fn parse_progress(content: &str) -> ProgressIndex {
    let mut index = ProgressIndex::default();
    for record in decode_lines::<ProgressRecord>(content, "progress") {
        let (filepath, keys) = match record {
            ProgressRecord::File { filepath, keys } | ProgressRecord::Chunk { filepath, keys, .. } => {
                (filepath, keys)
            }
        };
        index.files.entry(filepath).or_default().extend(keys);
    }
    index
}

/// Parse and merge a store file
///
/// Chunks of a filepath are applied in `chunkIndex` order; a whole-file record
/// is applied before any chunk. A later value for the same key wins.
#[must_use]
pub fn parse_store(content: &str) -> SourceStore {
    let mut parts: BTreeMap<String, Vec<(i64, BTreeMap<String, String>)>> = BTreeMap::new();
    for record in decode_lines::<StoreRecord>(content, "store") {
        let (filepath, order, entries) = match record {
            StoreRecord::File { filepath, entries } => (filepath, -1, entries),
            StoreRecord::Chunk {
                filepath,
                chunk_index,
                total_chunks,
                entries,
            } => {
                if chunk_index >= total_chunks {
                    tracing::warn!(%filepath, chunk_index, total_chunks, "chunk index out of range");
                }
                (filepath, i64::from(chunk_index), entries)
            }
        };
        parts.entry(filepath).or_default().push((order, entries));
    }

    let mut store = SourceStore::default();
    for (filepath, mut chunks) in parts {
        // stable: records with the same index keep file order
        chunks.sort_by_key(|(order, _)| *order);
        let merged = store.files.entry(filepath).or_default();
        for (_, entries) in chunks {
            merged.extend(entries);
        }
    }
    store
}
