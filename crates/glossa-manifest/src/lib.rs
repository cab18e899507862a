//! Glossa Manifest
//!
//! Reads the repository-resident manifest that maps (language, logical
//! filename) to physical source paths, plus the per-language progress and
//! store side files.
//!
//! Everything here is a pure function over text; fetching the files is the
//! fetcher's job.
//!
//! # Example
//!
//! ```rust
//! let content = r#"{"type":"header","repository":"acme/site","sourceLanguage":"en","configVersion":1}"#;
//! let manifest = glossa_manifest::parse(content).unwrap();
//! assert!(manifest.is_empty());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod model;
pub mod reader;
pub mod side_files;

pub use error::ManifestError;
pub use model::{Manifest, ManifestEntry, ManifestHeader, ManifestRecord};
pub use reader::{parse, records, serialize, RecordReader};
pub use side_files::{
    parse_progress, parse_store, resolve_placeholder, ProgressIndex, ProgressRecord, SourceStore,
    StoreRecord, LANG_PLACEHOLDER,
};

/// Default manifest path inside the repository
pub const MANIFEST_PATH: &str = ".glossa/manifest.jsonl";

/// Progress side file for a language
#[must_use]
pub fn progress_path(language: &str) -> String {
    format!(".glossa/progress-translated/{language}.jsonl")
}

/// Store side file for a language
#[must_use]
pub fn store_path(language: &str) -> String {
    format!(".glossa/store/{language}.jsonl")
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
