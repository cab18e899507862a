//! Lightweight per-file records for listings
//!
//! Written next to every payload so listing a project's files never decodes a
//! full payload.

use chrono::{DateTime, Utc};
use glossa_core::SourceHash;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Listing row for one cached file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub project_id: String,
    pub language: String,
    pub filename: String,
    pub total_keys: usize,
    pub source_hash: SourceHash,
    pub revision_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Field a listing is sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Filename,
    Language,
    TotalKeys,
    UpdatedAt,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filename" => Ok(Self::Filename),
            "language" | "lang" => Ok(Self::Language),
            "totalKeys" | "keys" => Ok(Self::TotalKeys),
            "updatedAt" => Ok(Self::UpdatedAt),
            other => Err(format!("unknown sort field: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Sort summaries in place; the sort is stable and ties keep (language, filename) order
pub fn sort_summaries(items: &mut [FileSummary], key: SortKey, order: SortOrder) {
    items.sort_by(|a, b| {
        (a.language.as_str(), a.filename.as_str()).cmp(&(b.language.as_str(), b.filename.as_str()))
    });
    items.sort_by(|a, b| {
        let ord = compare(a, b, key);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

fn compare(a: &FileSummary, b: &FileSummary, key: SortKey) -> Ordering {
    match key {
        SortKey::Filename => a.filename.cmp(&b.filename),
        SortKey::Language => a.language.cmp(&b.language),
        SortKey::TotalKeys => a.total_keys.cmp(&b.total_keys),
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}
