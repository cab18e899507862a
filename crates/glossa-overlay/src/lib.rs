//! Glossa Overlay
//!
//! Community translation edits layered on repository content.
//!
//! # Components
//!
//! - [`OverlayStore`]: per-row atomic storage with an append-only audit trail
//! - [`reconcile`]: merges repository values and overlay edits per key
//! - [`invalidate`] / [`InvalidationService`]: marks approved edits stale when
//!   the source value they were written against changes
//!
//! # Validity
//!
//! An entry is valid iff its `source_hash_at_submission` equals the current
//! source hash of its key.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod invalidate;
pub mod model;
pub mod reconcile;
pub mod store;

pub use error::{OverlayError, ValidationError};
pub use invalidate::{
    check_consistency, invalidate, validate_batch, Invalidation, InvalidationOutcome,
    InvalidationService, TranslationCheck, ValidationResult, REASON_KEY_REMOVED,
    REASON_SOURCE_CHANGED, REASON_UNTRACKED,
};
pub use model::{
    AuditAction, AuditRecord, NewOverlayEntry, OverlayEntry, OverlayFilter, OverlayStatus,
    ReconcileStatus, ReconciledView, RepoValue,
};
pub use reconcile::{reconcile, select_entry};
pub use store::{MemoryOverlayStore, OverlayStore, SharedOverlayStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
