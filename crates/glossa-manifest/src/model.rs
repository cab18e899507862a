//! Manifest data model
//!
//! A [`Manifest`] is one repository snapshot's index of translation files.
//! It is immutable once built and is replaced wholesale on the next sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// First record of every manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestHeader {
    pub repository: String,
    pub source_language: String,
    pub config_version: u32,
}

/// One physical translation file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Logical filename, e.g. `common.json`
    pub filename: String,
    /// Physical path in the repository
    pub source_filename: String,
    pub language: String,
    pub last_updated: DateTime<Utc>,
    pub commit_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_keys: Option<u64>,
}

/// One line of the manifest file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ManifestRecord {
    Header(ManifestHeader),
    File { entry: ManifestEntry },
    /// Record types this version does not know about
    #[serde(other)]
    Unknown,
}

/// Parsed manifest with (language, filename) lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    header: ManifestHeader,
    entries: Vec<ManifestEntry>,
    index: BTreeMap<(String, String), usize>,
}

impl Manifest {
    /// Build a manifest; the first entry wins for a duplicated (language, filename)
    #[must_use]
    pub fn new(header: ManifestHeader, entries: impl IntoIterator<Item = ManifestEntry>) -> Self {
        let mut kept = Vec::new();
        let mut index = BTreeMap::new();
        for entry in entries {
            let id = (entry.language.clone(), entry.filename.clone());
            if index.contains_key(&id) {
                tracing::warn!(
                    language = %entry.language,
                    filename = %entry.filename,
                    "duplicate manifest entry ignored"
                );
                continue;
            }
            index.insert(id, kept.len());
            kept.push(entry);
        }
        Self {
            header,
            entries: kept,
            index,
        }
    }

    #[inline]
    #[must_use]
    pub fn header(&self) -> &ManifestHeader {
        &self.header
    }

    /// All entries in manifest order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up one file
    #[must_use]
    pub fn find_entry(&self, language: &str, filename: &str) -> Option<&ManifestEntry> {
        self.index
            .get(&(language.to_string(), filename.to_string()))
            .map(|&i| &self.entries[i])
    }

    /// Every file of one language, in manifest order
    #[must_use]
    pub fn entries_for_language(&self, language: &str) -> Vec<&ManifestEntry> {
        self.entries
            .iter()
            .filter(|e| e.language == language)
            .collect()
    }

    /// Files written in the source language
    #[must_use]
    pub fn source_entries(&self) -> Vec<&ManifestEntry> {
        self.entries_for_language(&self.header.source_language)
    }

    /// Distinct languages present
    #[must_use]
    pub fn languages(&self) -> BTreeSet<String> {
        self.entries.iter().map(|e| e.language.clone()).collect()
    }

    /// Freshest `lastUpdated` across all entries
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|e| e.last_updated).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(language: &str, filename: &str, day: u32) -> ManifestEntry {
        ManifestEntry {
            filename: filename.to_string(),
            source_filename: format!("locales/{language}/{filename}"),
            language: language.to_string(),
            last_updated: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            commit_hash: "abc123".to_string(),
            total_keys: None,
        }
    }

    fn header() -> ManifestHeader {
        ManifestHeader {
            repository: "acme/site".to_string(),
            source_language: "en".to_string(),
            config_version: 1,
        }
    }

    #[test]
    fn find_entry_by_language_and_filename() {
        let manifest = Manifest::new(
            header(),
            vec![entry("en", "common.json", 1), entry("ja", "common.json", 2)],
        );
        let found = manifest.find_entry("ja", "common.json").unwrap();
        assert_eq!(found.source_filename, "locales/ja/common.json");
        assert!(manifest.find_entry("fr", "common.json").is_none());
    }

    #[test]
    fn duplicates_keep_first() {
        let mut second = entry("en", "common.json", 5);
        second.commit_hash = "later".to_string();
        let manifest = Manifest::new(header(), vec![entry("en", "common.json", 1), second]);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.entries()[0].commit_hash, "abc123");
    }

    #[test]
    fn languages_and_source_entries() {
        let manifest = Manifest::new(
            header(),
            vec![
                entry("en", "common.json", 1),
                entry("ja", "common.json", 2),
                entry("en", "home.json", 3),
            ],
        );
        let langs: Vec<_> = manifest.languages().into_iter().collect();
        assert_eq!(langs, vec!["en".to_string(), "ja".to_string()]);
        assert_eq!(manifest.source_entries().len(), 2);
        assert_eq!(manifest.entries_for_language("ja").len(), 1);
    }

    #[test]
    fn last_updated_is_max() {
        let manifest = Manifest::new(
            header(),
            vec![entry("en", "a.json", 4), entry("en", "b.json", 9)],
        );
        assert_eq!(
            manifest.last_updated(),
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap())
        );
        assert_eq!(Manifest::new(header(), vec![]).last_updated(), None);
    }
}
