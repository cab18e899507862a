//! Merge repository truth with overlay edits
//!
//! Pure function over plain data; the result depends only on the set of
//! inputs, never their order.

use crate::model::{OverlayEntry, OverlayStatus, ReconcileStatus, ReconciledView, RepoValue};
use std::collections::{BTreeMap, BTreeSet};

/// Best overlay entry for one key
///
/// An approved entry wins over any pending one; among approved entries the
/// most recently updated wins. Without an approved entry the oldest pending
/// submission wins. Ties fall to the smaller id. Rejected and deleted entries
/// are never selected.
#[must_use]
pub fn select_entry<'a, I>(entries: I) -> Option<&'a OverlayEntry>
where
    I: IntoIterator<Item = &'a OverlayEntry>,
{
    let mut approved: Option<&OverlayEntry> = None;
    let mut pending: Option<&OverlayEntry> = None;

    for entry in entries {
        match entry.status {
            OverlayStatus::Approved => {
                let better = approved.map_or(true, |best| {
                    (entry.updated_at, std::cmp::Reverse(&entry.id))
                        > (best.updated_at, std::cmp::Reverse(&best.id))
                });
                if better {
                    approved = Some(entry);
                }
            }
            OverlayStatus::Pending => {
                let better = pending.map_or(true, |best| {
                    (entry.submitted_at, &entry.id) < (best.submitted_at, &best.id)
                });
                if better {
                    pending = Some(entry);
                }
            }
            OverlayStatus::Rejected | OverlayStatus::Deleted => {}
        }
    }
    approved.or(pending)
}

/// One row per key, sorted by key
///
/// Keys present only through rejected or deleted overlay entries produce no
/// row.
#[must_use]
pub fn reconcile(repo: &BTreeMap<String, RepoValue>, overlay: &[OverlayEntry]) -> Vec<ReconciledView> {
    let mut by_key: BTreeMap<&str, Vec<&OverlayEntry>> = BTreeMap::new();
    for entry in overlay {
        by_key.entry(entry.key.as_str()).or_default().push(entry);
    }

    let keys: BTreeSet<&str> = repo
        .keys()
        .map(String::as_str)
        .chain(by_key.keys().copied())
        .collect();

    keys.into_iter()
        .filter_map(|key| {
            let repo_value = repo.get(key);
            let selected = by_key.get(key).and_then(|entries| select_entry(entries.iter().copied()));

            let (status, source_hash) = match (repo_value, selected) {
                (Some(repo), None) => (ReconcileStatus::RepositoryOnly, repo.hash),
                (Some(repo), Some(_)) => (ReconcileStatus::Both, repo.hash),
                (None, Some(entry)) if entry.status == OverlayStatus::Approved => {
                    (ReconcileStatus::OverlayApproved, entry.source_hash_at_submission)
                }
                (None, Some(entry)) => (ReconcileStatus::OverlayPending, entry.source_hash_at_submission),
                (None, None) => return None,
            };

            Some(ReconciledView {
                key: key.to_string(),
                repository_value: repo_value.map(|r| r.value.clone()),
                overlay_value: selected.map(|e| e.value.clone()),
                source_hash,
                status,
                selected_overlay_entry_id: selected.map(|e| e.id.clone()),
            })
        })
        .collect()
}
