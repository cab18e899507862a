//! Error types for the overlay layer

use crate::model::OverlayStatus;

/// Errors from overlay store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    /// No entry with this id
    #[error("overlay entry not found: {0}")]
    NotFound(String),

    /// Status change not allowed from the current status
    #[error("cannot move overlay entry {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: OverlayStatus,
        to: OverlayStatus,
    },
}

impl OverlayError {
    /// Create not-found error for id
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Check if the caller should treat this as a conflict (HTTP 409)
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

/// Internal consistency violations found in overlay data
///
/// Logged by the service layer, never returned to API clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Two entries share an id
    #[error("duplicate overlay entry id: {0}")]
    DuplicateId(String),

    /// Approved entry without a key
    #[error("approved overlay entry {id} has an empty key")]
    MissingKey { id: String },
}
