//! Staleness detection for overlay edits
//!
//! An edit is valid exactly while the source value it was written against is
//! unchanged. [`invalidate`] finds approved edits whose source hash moved;
//! [`InvalidationService`] applies the result through the store.

use crate::error::ValidationError;
use crate::model::{OverlayEntry, OverlayFilter, OverlayStatus};
use crate::store::OverlayStore;
use glossa_core::SourceHash;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One approved entry that no longer matches its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invalidation {
    pub id: String,
    pub key: String,
    pub previous_hash: SourceHash,
    /// `None` when the key no longer exists in the source
    pub new_hash: Option<SourceHash>,
}

/// Result of one invalidation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationOutcome {
    pub invalidated: Vec<Invalidation>,
}

impl InvalidationOutcome {
    #[must_use]
    pub fn len(&self) -> usize {
        self.invalidated.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invalidated.is_empty()
    }
}

/// Approved, still-valid entries whose key vanished or whose hash changed
///
/// Single pass with one hash-map lookup per entry.
#[must_use]
pub fn invalidate(current: &HashMap<String, SourceHash>, entries: &[OverlayEntry]) -> InvalidationOutcome {
    let invalidated = entries
        .iter()
        .filter(|e| e.status == OverlayStatus::Approved && e.is_valid)
        .filter_map(|e| {
            let now = current.get(&e.key).copied();
            (now != Some(e.source_hash_at_submission)).then(|| Invalidation {
                id: e.id.clone(),
                key: e.key.clone(),
                previous_hash: e.source_hash_at_submission,
                new_hash: now,
            })
        })
        .collect();
    InvalidationOutcome { invalidated }
}

/// A translation to check against current source hashes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationCheck {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub source_hash: Option<SourceHash>,
}

impl From<&OverlayEntry> for TranslationCheck {
    fn from(entry: &OverlayEntry) -> Self {
        Self {
            id: entry.id.clone(),
            key: entry.key.clone(),
            source_hash: Some(entry.source_hash_at_submission),
        }
    }
}

/// Why a translation is no longer valid
pub const REASON_KEY_REMOVED: &str = "Key no longer exists in source";
pub const REASON_UNTRACKED: &str = "Translation missing source tracking";
pub const REASON_SOURCE_CHANGED: &str = "Source value changed";

/// Validity of one checked translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: String,
    pub is_valid: bool,
    pub reason: Option<String>,
}

/// Check many translations at once, in input order
#[must_use]
pub fn validate_batch(
    checks: &[TranslationCheck],
    current: &HashMap<String, SourceHash>,
) -> Vec<ValidationResult> {
    checks
        .iter()
        .map(|check| {
            let reason = match (current.get(&check.key), check.source_hash) {
                (None, _) => Some(REASON_KEY_REMOVED),
                (Some(_), None) => Some(REASON_UNTRACKED),
                (Some(now), Some(then)) if *now != then => Some(REASON_SOURCE_CHANGED),
                _ => None,
            };
            ValidationResult {
                id: check.id.clone(),
                is_valid: reason.is_none(),
                reason: reason.map(str::to_string),
            }
        })
        .collect()
}

/// Internal consistency problems in a set of entries
#[must_use]
pub fn check_consistency(entries: &[OverlayEntry]) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    let mut problems = Vec::new();
    for entry in entries {
        if !seen.insert(entry.id.as_str()) {
            problems.push(ValidationError::DuplicateId(entry.id.clone()));
        }
        if entry.status == OverlayStatus::Approved && entry.key.trim().is_empty() {
            problems.push(ValidationError::MissingKey { id: entry.id.clone() });
        }
    }
    problems
}

/// Applies invalidation passes to an overlay store
#[derive(Debug)]
pub struct InvalidationService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: OverlayStore + ?Sized> InvalidationService<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Invalidate stale approved entries for `filename`
    ///
    /// `language` narrows the pass to one target language; `None` covers every
    /// translation of the file. Rows are flipped with the store's
    /// compare-and-set, so a second run with the same hashes flips nothing and
    /// rows changed concurrently are left alone.
    pub async fn run(
        &self,
        project_id: &str,
        language: Option<&str>,
        filename: &str,
        current: &HashMap<String, SourceHash>,
    ) -> InvalidationOutcome {
        let mut filter = OverlayFilter::project(project_id)
            .with_filename(filename)
            .with_status(OverlayStatus::Approved);
        if let Some(language) = language {
            filter = filter.with_language(language);
        }
        let entries = self.store.list(&filter).await;

        for problem in check_consistency(&entries) {
            tracing::warn!(project_id, filename, %problem, "inconsistent overlay data");
        }

        let candidates = invalidate(current, &entries);
        let mut applied = Vec::with_capacity(candidates.len());
        for row in candidates.invalidated {
            match self.store.mark_invalid(&row.id, row.new_hash).await {
                Ok(Some(_)) => applied.push(row),
                Ok(None) => {}
                Err(err) => tracing::warn!(id = %row.id, error = %err, "cannot invalidate overlay entry"),
            }
        }

        if !applied.is_empty() {
            tracing::info!(project_id, filename, count = applied.len(), "invalidated stale overlay entries");
        }
        InvalidationOutcome { invalidated: applied }
    }
}
