//! Overlay persistence
//!
//! Every write is atomic per row; there are no cross-row transactions.

use crate::error::OverlayError;
use crate::model::{AuditAction, AuditRecord, NewOverlayEntry, OverlayEntry, OverlayFilter, OverlayStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use glossa_core::{SharedClock, SourceHash};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

/// Storage for overlay entries and their audit trail
#[async_trait]
pub trait OverlayStore: Send + Sync + Debug {
    /// Insert a new entry with status `pending`
    async fn insert(&self, entry: NewOverlayEntry) -> OverlayEntry;

    async fn get(&self, id: &str) -> Option<OverlayEntry>;

    /// Entries selected by `filter`, ordered by submission time then id
    async fn list(&self, filter: &OverlayFilter) -> Vec<OverlayEntry>;

    /// Move an entry to `to`
    ///
    /// Moving to the current status is a no-op that returns the entry
    /// unchanged.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `InvalidTransition` for disallowed moves
    async fn transition(
        &self,
        id: &str,
        to: OverlayStatus,
        actor: Option<&str>,
    ) -> Result<OverlayEntry, OverlayError>;

    /// Compare-and-set `is_valid` to false on an approved, valid row
    ///
    /// Returns the updated entry when this call flipped it, `None` when the
    /// row was no longer approved and valid.
    ///
    /// # Errors
    /// `NotFound` for unknown ids
    async fn mark_invalid(
        &self,
        id: &str,
        new_hash: Option<SourceHash>,
    ) -> Result<Option<OverlayEntry>, OverlayError>;

    /// Audit trail of one entry, oldest first
    async fn audit(&self, entry_id: &str) -> Vec<AuditRecord>;
}

/// Shared overlay store handle
pub type SharedOverlayStore = Arc<dyn OverlayStore>;

/// In-memory overlay store
#[derive(Debug)]
pub struct MemoryOverlayStore {
    entries: DashMap<String, OverlayEntry>,
    audit: Mutex<Vec<AuditRecord>>,
    clock: SharedClock,
}

impl MemoryOverlayStore {
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            audit: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// Number of stored entries, deleted ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(&self, record: AuditRecord) {
        self.audit.lock().push(record);
    }
}

#[async_trait]
impl OverlayStore for MemoryOverlayStore {
    async fn insert(&self, new: NewOverlayEntry) -> OverlayEntry {
        let now = self.clock.now();
        let entry = OverlayEntry {
            id: Uuid::new_v4().to_string(),
            project_id: new.project_id,
            key: new.key,
            language: new.language,
            filename: new.filename,
            value: new.value,
            submitted_by: new.submitted_by,
            status: OverlayStatus::Pending,
            source_hash_at_submission: new.source_hash_at_submission,
            is_valid: new.is_valid,
            submitted_at: now,
            updated_at: now,
        };
        self.entries.insert(entry.id.clone(), entry.clone());
        self.record(AuditRecord {
            entry_id: entry.id.clone(),
            action: AuditAction::Submitted,
            actor: Some(entry.submitted_by.clone()),
            previous_hash: None,
            new_hash: Some(entry.source_hash_at_submission),
            at: now,
        });
        tracing::debug!(id = %entry.id, key = %entry.key, language = %entry.language, "overlay entry submitted");
        entry
    }

    async fn get(&self, id: &str) -> Option<OverlayEntry> {
        self.entries.get(id).map(|e| e.value().clone())
    }

    async fn list(&self, filter: &OverlayFilter) -> Vec<OverlayEntry> {
        let mut out: Vec<OverlayEntry> = self
            .entries
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| (a.submitted_at, &a.id).cmp(&(b.submitted_at, &b.id)));
        out
    }

    async fn transition(
        &self,
        id: &str,
        to: OverlayStatus,
        actor: Option<&str>,
    ) -> Result<OverlayEntry, OverlayError> {
        let mut row = self.entries.get_mut(id).ok_or_else(|| OverlayError::not_found(id))?;
        let from = row.status;
        if from == to {
            return Ok(row.clone());
        }
        if !from.can_transition_to(to) {
            return Err(OverlayError::InvalidTransition {
                id: id.to_string(),
                from,
                to,
            });
        }

        let now = self.clock.now();
        row.status = to;
        row.updated_at = now;
        let entry = row.clone();
        drop(row);

        self.record(AuditRecord {
            entry_id: entry.id.clone(),
            action: to.audit_action(),
            actor: actor.map(str::to_string),
            previous_hash: None,
            new_hash: None,
            at: now,
        });
        tracing::info!(id, %from, %to, "overlay entry transitioned");
        Ok(entry)
    }

    async fn mark_invalid(
        &self,
        id: &str,
        new_hash: Option<SourceHash>,
    ) -> Result<Option<OverlayEntry>, OverlayError> {
        let mut row = self.entries.get_mut(id).ok_or_else(|| OverlayError::not_found(id))?;
        if row.status != OverlayStatus::Approved || !row.is_valid {
            return Ok(None);
        }

        let now = self.clock.now();
        row.is_valid = false;
        row.updated_at = now;
        let entry = row.clone();
        drop(row);

        self.record(AuditRecord {
            entry_id: entry.id.clone(),
            action: AuditAction::Invalidated,
            actor: None,
            previous_hash: Some(entry.source_hash_at_submission),
            new_hash,
            at: now,
        });
        Ok(Some(entry))
    }

    async fn audit(&self, entry_id: &str) -> Vec<AuditRecord> {
        self.audit
            .lock()
            .iter()
            .filter(|r| r.entry_id == entry_id)
            .cloned()
            .collect()
    }
}
