//! Bootstrap discovery for repositories without a manifest
//!
//! Walks the translation root breadth-first. Each level's directories are
//! listed concurrently, bounded by [`DiscoveryLimits::concurrency`], and the
//! walk stops at `max_depth` or `max_files` to bound fan-out.

use crate::error::FetchError;
use crate::fetcher::{DirEntry, EntryKind};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use glossa_manifest::ManifestEntry;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// File extensions the metadata builder understands
pub const TRANSLATION_EXTENSIONS: &[&str] = &["json", "toml", "md", "markdown"];

/// Fan-out guard for directory descent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryLimits {
    /// Deepest directory level listed (root is 0)
    pub max_depth: usize,
    pub max_files: usize,
    /// Concurrent listings per level
    pub concurrency: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_files: 500,
            concurrency: 8,
        }
    }
}

/// Result of a discovery walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// File paths, sorted
    pub files: Vec<String>,
    /// A limit or an unlistable directory cut the walk short
    pub truncated: bool,
    /// Directories below the root whose listing failed, sorted by path
    pub failed_dirs: Vec<FailedDir>,
}

/// Directory left out of a discovery walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDir {
    pub path: String,
    pub error: String,
}

/// Discover every file under `root` through `list`
///
/// `list` receives a directory path and returns its entries; callers wrap
/// the fetcher's listing in their retry policy here. Directories below the
/// root that still fail are recorded in [`Discovery::failed_dirs`] and mark
/// the walk truncated.
///
/// # Errors
/// Returns the root listing's error
pub async fn discover<F, Fut>(root: &str, limits: &DiscoveryLimits, list: F) -> Result<Discovery, FetchError>
where
    F: Fn(String) -> Fut + Sync,
    Fut: Future<Output = Result<Vec<DirEntry>, FetchError>> + Send,
{
    let mut discovery = Discovery::default();
    let root_listing = list(root.to_string()).await?;

    let mut level = Vec::new();
    for entry in root_listing {
        match entry.kind {
            EntryKind::File => discovery.files.push(entry.path),
            EntryKind::Dir => level.push(entry.path),
            EntryKind::Other => {}
        }
    }

    let mut depth = 1;
    while !level.is_empty() && discovery.files.len() < limits.max_files {
        if depth > limits.max_depth {
            tracing::warn!(root, depth, "discovery depth limit reached");
            discovery.truncated = true;
            break;
        }

        let list = &list;
        let listings: Vec<(String, Result<Vec<DirEntry>, FetchError>)> = stream::iter(std::mem::take(&mut level))
            .map(|dir| {
                let listing = list(dir.clone());
                async move { (dir, listing.await) }
            })
            .buffer_unordered(limits.concurrency.max(1))
            .boxed()
            .collect()
            .await;

        for (dir, listing) in listings {
            match listing {
                Ok(entries) => {
                    for entry in entries {
                        match entry.kind {
                            EntryKind::File => discovery.files.push(entry.path),
                            EntryKind::Dir => level.push(entry.path),
                            EntryKind::Other => {}
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(%dir, error = %err, "directory could not be listed");
                    discovery.truncated = true;
                    discovery.failed_dirs.push(FailedDir {
                        path: dir,
                        error: err.to_string(),
                    });
                }
            }
        }
        depth += 1;
    }

    discovery.files.sort();
    discovery.failed_dirs.sort_by(|a, b| a.path.cmp(&b.path));
    if discovery.files.len() > limits.max_files {
        tracing::warn!(root, max_files = limits.max_files, "discovery file limit reached");
        discovery.files.truncate(limits.max_files);
        discovery.truncated = true;
    } else if discovery.files.len() == limits.max_files && !level.is_empty() {
        discovery.truncated = true;
    }
    Ok(discovery)
}

/// Derive manifest entries from `{root}/{language}/{filename}` paths
///
/// Paths outside the root, directly in the root, or with unsupported
/// extensions are ignored.
#[must_use]
pub fn infer_entries(
    files: &[String],
    root: &str,
    revision: &str,
    at: DateTime<Utc>,
) -> Vec<ManifestEntry> {
    let root = root.trim_matches('/');
    files
        .iter()
        .filter_map(|path| {
            let relative = if root.is_empty() {
                path.as_str()
            } else {
                path.strip_prefix(root)?.strip_prefix('/')?
            };
            let (language, filename) = relative.split_once('/')?;
            let ext = filename.rsplit_once('.').map(|(_, e)| e)?;
            if language.is_empty() || !TRANSLATION_EXTENSIONS.contains(&ext) {
                return None;
            }
            Some(ManifestEntry {
                filename: filename.to_string(),
                source_filename: path.clone(),
                language: language.to_string(),
                last_updated: at,
                commit_hash: revision.to_string(),
                total_keys: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{RawFile, RemoteFetcher};
    use async_trait::async_trait;
    use glossa_core::Blame;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct TreeFetcher {
        dirs: HashMap<String, Vec<DirEntry>>,
    }

    impl TreeFetcher {
        fn dir(mut self, path: &str, children: &[(&str, EntryKind)]) -> Self {
            let entries = children
                .iter()
                .map(|(name, kind)| DirEntry {
                    name: (*name).to_string(),
                    path: if path.is_empty() {
                        (*name).to_string()
                    } else {
                        format!("{path}/{name}")
                    },
                    kind: *kind,
                })
                .collect();
            self.dirs.insert(path.to_string(), entries);
            self
        }
    }

    #[async_trait]
    impl RemoteFetcher for TreeFetcher {
        async fn fetch_streaming(&self, path: &str, _revision: &str) -> Result<RawFile, FetchError> {
            Err(FetchError::not_found(path))
        }

        async fn fetch_whole(&self, path: &str, _revision: &str) -> Result<RawFile, FetchError> {
            Err(FetchError::not_found(path))
        }

        async fn list_dir(&self, path: &str, _revision: &str) -> Result<Vec<DirEntry>, FetchError> {
            self.dirs
                .get(path)
                .cloned()
                .ok_or_else(|| FetchError::Transient(format!("cannot list {path}")))
        }

        async fn latest_commit(&self, _path: &str, _revision: &str) -> Result<Option<Blame>, FetchError> {
            Ok(None)
        }

        async fn resolve_revision(&self, reference: &str) -> Result<String, FetchError> {
            Ok(reference.to_string())
        }
    }

    async fn walk(fetcher: &TreeFetcher, limits: &DiscoveryLimits) -> Result<Discovery, FetchError> {
        discover("locales", limits, move |dir: String| async move { fetcher.list_dir(&dir, "rev").await }).await
    }

    fn tree() -> TreeFetcher {
        TreeFetcher::default()
            .dir("locales", &[("en", EntryKind::Dir), ("ja", EntryKind::Dir), ("README.md", EntryKind::File)])
            .dir("locales/en", &[("common.json", EntryKind::File), ("pages", EntryKind::Dir)])
            .dir("locales/en/pages", &[("home.json", EntryKind::File)])
            .dir("locales/ja", &[("common.json", EntryKind::File)])
    }

    #[tokio::test]
    async fn discover_walks_tree() {
        let found = walk(&tree(), &DiscoveryLimits::default()).await.unwrap();
        assert_eq!(
            found.files,
            vec![
                "locales/README.md",
                "locales/en/common.json",
                "locales/en/pages/home.json",
                "locales/ja/common.json",
            ]
        );
        assert!(!found.truncated);
    }

    #[tokio::test]
    async fn discover_respects_depth() {
        let limits = DiscoveryLimits {
            max_depth: 1,
            ..DiscoveryLimits::default()
        };
        let found = walk(&tree(), &limits).await.unwrap();
        assert!(found.truncated);
        assert!(!found.files.contains(&"locales/en/pages/home.json".to_string()));
        assert!(found.files.contains(&"locales/ja/common.json".to_string()));
    }

    #[tokio::test]
    async fn discover_respects_file_cap() {
        let limits = DiscoveryLimits {
            max_files: 2,
            ..DiscoveryLimits::default()
        };
        let found = walk(&tree(), &limits).await.unwrap();
        assert_eq!(found.files.len(), 2);
        assert!(found.truncated);
    }

    #[tokio::test]
    async fn discover_reports_failing_subdirectories() {
        let fetcher = TreeFetcher::default()
            .dir("locales", &[("en", EntryKind::Dir), ("broken", EntryKind::Dir)])
            .dir("locales/en", &[("a.json", EntryKind::File)]);
        let found = walk(&fetcher, &DiscoveryLimits::default()).await.unwrap();
        assert_eq!(found.files, vec!["locales/en/a.json"]);
        assert!(found.truncated);
        assert_eq!(found.failed_dirs.len(), 1);
        assert_eq!(found.failed_dirs[0].path, "locales/broken");
        assert!(found.failed_dirs[0].error.contains("cannot list locales/broken"));
    }

    #[tokio::test]
    async fn discover_lists_through_the_caller() {
        let fetcher = &tree();
        let calls = &AtomicUsize::new(0);
        let found = discover("locales", &DiscoveryLimits::default(), move |dir: String| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            if dir == "locales/ja" {
                return Err(FetchError::RateLimited { retry_after: None });
            }
            fetcher.list_dir(&dir, "rev").await
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(!found.files.contains(&"locales/ja/common.json".to_string()));
        assert!(found.truncated);
        assert_eq!(
            found.failed_dirs.iter().map(|d| d.path.as_str()).collect::<Vec<_>>(),
            vec!["locales/ja"]
        );
    }

    #[tokio::test]
    async fn discover_propagates_root_failure() {
        let err = walk(&TreeFetcher::default(), &DiscoveryLimits::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn infer_entries_from_paths() {
        let files = vec![
            "locales/README.md".to_string(),
            "locales/en/common.json".to_string(),
            "locales/en/pages/home.json".to_string(),
            "locales/ja/common.json".to_string(),
            "locales/ja/notes.txt".to_string(),
            "other/en/x.json".to_string(),
        ];
        let at = Utc::now();
        let entries = infer_entries(&files, "locales/", "sha1", at);
        let ids: Vec<_> = entries
            .iter()
            .map(|e| (e.language.as_str(), e.filename.as_str()))
            .collect();
        assert_eq!(
            ids,
            vec![("en", "common.json"), ("en", "pages/home.json"), ("ja", "common.json")]
        );
        assert!(entries.iter().all(|e| e.commit_hash == "sha1" && e.last_updated == at));
    }
}
