//! Glossa Cache
//!
//! Durable storage for processed translation files.
//!
//! # Layout
//!
//! ```text
//! {project}-{language}-{sanitized filename}        MessagePack payload
//! meta-{project}-{language}-{sanitized filename}   JSON FileSummary
//! manifest-{project}.json                          manifest snapshot + revision
//! ```
//!
//! A resync overwrites both objects in place. Reads go through an in-process
//! [`ReadCache`] first; a cold read decodes the same bytes a warm read caches.
//!
//! # ETags
//!
//! [`ETag::from_timestamps`] digests the freshest timestamp behind a response;
//! [`conditional`] turns a matching `If-None-Match` into a 304.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod etag;
pub mod key;
pub mod packed;
pub mod payload_cache;
pub mod read_cache;
pub mod store;
pub mod summary;

pub use error::CacheError;
pub use etag::{conditional, etag_matches, CachePolicy, Conditional, ETag};
pub use key::{
    manifest_key, object_key, project_summary_prefix, sanitize_filename, summary_key,
    MANIFEST_PREFIX, SUMMARY_PREFIX,
};
pub use packed::{
    decode, encode, PackedFilePayload, PackedRecord, PayloadLimits, MAX_BYTES_PER_FILE,
    MAX_KEYS_PER_FILE,
};
pub use payload_cache::{ManifestSnapshot, PayloadCache};
pub use read_cache::{ReadCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore, SharedObjectStore};
pub use summary::{sort_summaries, FileSummary, SortKey, SortOrder};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
