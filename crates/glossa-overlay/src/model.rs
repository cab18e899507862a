//! Overlay entries, audit records and reconciled rows

use chrono::{DateTime, Utc};
use glossa_core::SourceHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an overlay entry
///
/// ```text
/// pending ──► approved ──► rejected ──► deleted
///    │            └──────────────────────▲
///    └──► rejected / deleted ────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayStatus {
    Pending,
    Approved,
    Rejected,
    Deleted,
}

impl OverlayStatus {
    /// Whether a move to `to` is allowed (same status counts as allowed)
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        use OverlayStatus::{Approved, Deleted, Pending, Rejected};
        matches!(
            (self, to),
            (Pending, Pending | Approved | Rejected | Deleted)
                | (Approved, Approved | Rejected | Deleted)
                | (Rejected, Rejected | Deleted)
                | (Deleted, Deleted)
        )
    }

    /// Audit action recorded when entering this status
    #[must_use]
    pub const fn audit_action(self) -> AuditAction {
        match self {
            Self::Pending => AuditAction::Submitted,
            Self::Approved => AuditAction::Approved,
            Self::Rejected => AuditAction::Rejected,
            Self::Deleted => AuditAction::Deleted,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for OverlayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-submitted translation edit
///
/// Never physically removed; `deleted` is a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayEntry {
    pub id: String,
    pub project_id: String,
    pub key: String,
    pub language: String,
    pub filename: String,
    pub value: String,
    pub submitted_by: String,
    pub status: OverlayStatus,
    /// Hash of the source-language value the edit was made against
    pub source_hash_at_submission: SourceHash,
    pub is_valid: bool,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new overlay entry; the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOverlayEntry {
    pub project_id: String,
    pub key: String,
    pub language: String,
    pub filename: String,
    pub value: String,
    pub submitted_by: String,
    pub source_hash_at_submission: SourceHash,
    pub is_valid: bool,
}

/// Selects overlay rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayFilter {
    pub project_id: String,
    pub language: Option<String>,
    pub filename: Option<String>,
    pub status: Option<OverlayStatus>,
}

impl OverlayFilter {
    #[must_use]
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: OverlayStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether `entry` is selected
    #[must_use]
    pub fn matches(&self, entry: &OverlayEntry) -> bool {
        entry.project_id == self.project_id
            && self.language.as_ref().map_or(true, |l| *l == entry.language)
            && self.filename.as_ref().map_or(true, |f| *f == entry.filename)
            && self.status.map_or(true, |s| s == entry.status)
    }
}

/// What happened to an overlay entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Submitted,
    Approved,
    Rejected,
    Deleted,
    Invalidated,
}

/// Append-only history row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub entry_id: String,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<SourceHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<SourceHash>,
    pub at: DateTime<Utc>,
}

/// Repository value of one key with the hash used for staleness checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoValue {
    pub value: String,
    pub hash: SourceHash,
}

impl RepoValue {
    #[must_use]
    pub fn new(value: impl Into<String>, hash: SourceHash) -> Self {
        Self {
            value: value.into(),
            hash,
        }
    }
}

/// Where a reconciled key's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    RepositoryOnly,
    OverlayPending,
    OverlayApproved,
    Both,
}

/// One key of the merged repository/overlay view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledView {
    pub key: String,
    pub repository_value: Option<String>,
    pub overlay_value: Option<String>,
    pub source_hash: SourceHash,
    pub status: ReconcileStatus,
    pub selected_overlay_entry_id: Option<String>,
}
