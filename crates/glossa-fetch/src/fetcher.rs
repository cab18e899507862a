//! Fetcher trait and transfer types

use crate::error::FetchError;
use async_trait::async_trait;
use glossa_core::Blame;
use std::fmt::Debug;
use std::sync::Arc;

/// Raw file bytes at one revision
///
/// Lives only for a single fetch-and-process pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub path: String,
    pub content: Vec<u8>,
    pub revision_id: String,
}

impl RawFile {
    #[must_use]
    pub fn new(path: impl Into<String>, content: Vec<u8>, revision_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content,
            revision_id: revision_id.into(),
        }
    }

    /// Content as UTF-8 text
    ///
    /// # Errors
    /// Returns error if the bytes are not valid UTF-8
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.content)
    }
}

/// Kind of a directory listing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// One directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
}

/// Read access to one remote repository
///
/// Every method makes exactly one request per strategy; retries belong to the
/// caller.
#[async_trait]
pub trait RemoteFetcher: Send + Sync + Debug {
    /// Raw byte transfer, consumed as a stream
    async fn fetch_streaming(&self, path: &str, revision: &str) -> Result<RawFile, FetchError>;

    /// Whole-body JSON transfer with base64 content
    async fn fetch_whole(&self, path: &str, revision: &str) -> Result<RawFile, FetchError>;

    /// List one directory
    async fn list_dir(&self, path: &str, revision: &str) -> Result<Vec<DirEntry>, FetchError>;

    /// Most recent commit touching `path` at `revision`
    async fn latest_commit(&self, path: &str, revision: &str) -> Result<Option<Blame>, FetchError>;

    /// Resolve a branch, tag or SHA to a commit SHA
    async fn resolve_revision(&self, reference: &str) -> Result<String, FetchError>;

    /// Streaming first, whole-body fallback
    ///
    /// A `NotFound` from the streaming attempt is returned as is, the fallback
    /// would hit the same missing path.
    async fn fetch(&self, path: &str, revision: &str) -> Result<RawFile, FetchError> {
        match self.fetch_streaming(path, revision).await {
            Ok(file) => Ok(file),
            Err(err) if err.is_not_found() => Err(err),
            Err(err) => {
                tracing::warn!(path, revision, error = %err, "streaming fetch failed, falling back to whole-body fetch");
                self.fetch_whole(path, revision).await
            }
        }
    }
}

/// Shared fetcher handle
pub type SharedFetcher = Arc<dyn RemoteFetcher>;
