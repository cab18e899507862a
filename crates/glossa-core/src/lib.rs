//! Glossa Core
//!
//! Primitives shared by every Glossa crate.
//!
//! # Core Concepts
//!
//! - [`SourceHash`]: 16-hex digest deciding whether an overlay edit is stale
//! - [`KeyMetadata`]: span, authorship and hash of one flattened key
//! - [`Clock`]: injectable time source for TTLs and timestamps
//!
//! # Example
//!
//! ```rust
//! use glossa_core::SourceHash;
//!
//! let hash = SourceHash::of("Hello");
//! assert_eq!(hash.to_string().len(), 16);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod clock;
pub mod hash;
pub mod metadata;

pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use hash::{batch_hash, file_hash, HashError, SourceHash, SOURCE_HASH_LEN};
pub use metadata::{Blame, CharRange, KeyMetadata, Position};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
