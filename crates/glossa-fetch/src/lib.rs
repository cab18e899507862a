//! Glossa Fetch
//!
//! Retrieves raw translation files from the hosting API.
//!
//! # Strategies
//!
//! 1. **Streaming**: raw media type, body consumed as a byte stream
//! 2. **Whole body**: JSON contents response with base64 payload
//!
//! [`RemoteFetcher::fetch`] tries them in that order. Both yield identical
//! bytes for the same (path, revision).
//!
//! # Architecture
//!
//! ```text
//! SyncService ──► RemoteFetcher::fetch ──► fetch_streaming ──┐
//!                                     └──► fetch_whole ◄─────┘ (fallback)
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod http;

pub use discovery::{
    discover, infer_entries, Discovery, DiscoveryLimits, FailedDir, TRANSLATION_EXTENSIONS,
};
pub use error::FetchError;
pub use fetcher::{DirEntry, EntryKind, RawFile, RemoteFetcher, SharedFetcher};
pub use http::{is_commit_sha, FetcherConfig, HttpFetcher};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
