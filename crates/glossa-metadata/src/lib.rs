//! Glossa Metadata
//!
//! Turns one raw translation file into flattened key/value pairs plus, per key,
//! its character span, authorship and source hash.
//!
//! # Formats
//!
//! | Extension | Decoder |
//! |-----------|---------|
//! | `.json` | serde_json |
//! | `.toml` | toml |
//! | `.md`, `.markdown` | TOML front-matter between `+++` fences |
//!
//! # Example
//!
//! ```rust
//! use glossa_metadata::build;
//!
//! let meta = build("en/common.json", "{\"greeting\": \"Hello\"}", None);
//! assert_eq!(meta.values["greeting"], "Hello");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod builder;
pub mod error;
pub mod flatten;
pub mod format;
pub mod locate;

pub use builder::{build, try_build, FileMetadata};
pub use error::ParseError;
pub use flatten::{flatten, KEY_SEPARATOR};
pub use format::{decode, Decoded, Format, FRONT_MATTER_FENCE};
pub use locate::{locate, SpanLocator};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
