//! Testing utilities for the Glossa workspace
//!
//! An in-memory, revision-aware repository that implements
//! [`RemoteFetcher`], plus fixture builders for manifests and files.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use glossa_core::{Blame, ManualClock};
use glossa_fetch::{DirEntry, EntryKind, FetchError, RawFile, RemoteFetcher};
use glossa_manifest::{Manifest, ManifestEntry, ManifestHeader};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BRANCH: &str = "main";
pub const REPOSITORY: &str = "acme/site";
pub const AUTHOR: &str = "Ada Author";
pub const EMAIL: &str = "ada@example.com";

/// Fixed start time for deterministic tests
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

#[must_use]
pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(epoch()))
}

#[derive(Debug, Clone)]
struct Commit {
    sha: String,
    at: DateTime<Utc>,
    files: BTreeMap<String, Vec<u8>>,
    changed: BTreeSet<String>,
}

/// Git-like repository held in memory
///
/// Every [`commit`](Self::commit) snapshots the whole tree and moves
/// [`BRANCH`] to it; older SHAs stay fetchable.
#[derive(Debug, Default)]
pub struct FakeRepository {
    commits: RwLock<Vec<Commit>>,
    failures: RwLock<HashMap<String, FetchError>>,
    limited_failures: RwLock<HashMap<String, (FetchError, usize)>>,
    streaming_failures: RwLock<HashMap<String, FetchError>>,
    fetches: AtomicUsize,
}

impl FakeRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `changes` on top of the head and return the new SHA
    ///
    /// A `None` content removes the path.
    pub fn commit<P, C>(&self, changes: impl IntoIterator<Item = (P, Option<C>)>) -> String
    where
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        let mut commits = self.commits.write();
        let mut files = commits.last().map(|c| c.files.clone()).unwrap_or_default();
        let mut changed = BTreeSet::new();
        for (path, content) in changes {
            let path = path.into();
            match content {
                Some(content) => {
                    files.insert(path.clone(), content.into());
                }
                None => {
                    files.remove(&path);
                }
            }
            changed.insert(path);
        }
        let n = commits.len() + 1;
        let sha = format!("{n:040x}");
        commits.push(Commit {
            sha: sha.clone(),
            at: epoch() + Duration::minutes(i64::try_from(n).unwrap()),
            files,
            changed,
        });
        sha
    }

    /// Write text files on top of the head
    pub fn commit_files(&self, files: &[(&str, &str)]) -> String {
        self.commit(files.iter().map(|(p, c)| (*p, Some(c.as_bytes().to_vec()))))
    }

    #[must_use]
    pub fn head(&self) -> Option<String> {
        self.commits.read().last().map(|c| c.sha.clone())
    }

    /// Fail every fetch or listing of `path` with `error` until cleared
    pub fn fail_path(&self, path: &str, error: FetchError) {
        self.failures.write().insert(path.to_string(), error);
    }

    /// Fail the next `times` fetches or listings of `path`
    pub fn fail_path_times(&self, path: &str, error: FetchError, times: usize) {
        self.limited_failures.write().insert(path.to_string(), (error, times));
    }

    /// Fail only the streaming strategy for `path`
    pub fn fail_streaming(&self, path: &str, error: FetchError) {
        self.streaming_failures.write().insert(path.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.failures.write().clear();
        self.limited_failures.write().clear();
        self.streaming_failures.write().clear();
    }

    /// File fetches served so far, both strategies counted
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn snapshot(&self, revision: &str) -> Result<Commit, FetchError> {
        let commits = self.commits.read();
        let found = if revision == BRANCH {
            commits.last()
        } else {
            commits.iter().find(|c| c.sha == revision)
        };
        found.cloned().ok_or_else(|| FetchError::not_found(revision))
    }

    fn injected(&self, path: &str) -> Result<(), FetchError> {
        if let Some(err) = self.failures.read().get(path) {
            return Err(err.clone());
        }
        let mut limited = self.limited_failures.write();
        if let Some((err, left)) = limited.get_mut(path) {
            let err = err.clone();
            *left = left.saturating_sub(1);
            if *left == 0 {
                limited.remove(path);
            }
            return Err(err);
        }
        Ok(())
    }

    fn read(&self, path: &str, revision: &str) -> Result<RawFile, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.injected(path)?;
        let commit = self.snapshot(revision)?;
        let content = commit.files.get(path).cloned().ok_or_else(|| FetchError::not_found(path))?;
        Ok(RawFile::new(path, content, commit.sha))
    }
}

#[async_trait]
impl RemoteFetcher for FakeRepository {
    async fn fetch_streaming(&self, path: &str, revision: &str) -> Result<RawFile, FetchError> {
        if let Some(err) = self.streaming_failures.read().get(path) {
            return Err(err.clone());
        }
        self.read(path, revision)
    }

    async fn fetch_whole(&self, path: &str, revision: &str) -> Result<RawFile, FetchError> {
        self.read(path, revision)
    }

    async fn list_dir(&self, path: &str, revision: &str) -> Result<Vec<DirEntry>, FetchError> {
        self.injected(path)?;
        let commit = self.snapshot(revision)?;
        let dir = path.trim_matches('/');
        let prefix = if dir.is_empty() { String::new() } else { format!("{dir}/") };

        let mut entries: BTreeMap<String, EntryKind> = BTreeMap::new();
        for file in commit.files.keys() {
            let Some(rest) = file.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((sub, _)) => entries.insert(format!("{prefix}{sub}"), EntryKind::Dir),
                None => entries.insert(file.clone(), EntryKind::File),
            };
        }
        if entries.is_empty() && !dir.is_empty() {
            return Err(FetchError::not_found(path));
        }
        Ok(entries
            .into_iter()
            .map(|(path, kind)| DirEntry {
                name: path.rsplit('/').next().unwrap_or_default().to_string(),
                path,
                kind,
            })
            .collect())
    }

    async fn latest_commit(&self, path: &str, revision: &str) -> Result<Option<Blame>, FetchError> {
        let target = self.snapshot(revision)?;
        let commits = self.commits.read();
        Ok(commits
            .iter()
            .take_while(|c| c.at <= target.at)
            .filter(|c| c.changed.contains(path))
            .last()
            .map(|c| Blame {
                revision_id: c.sha.clone(),
                author: AUTHOR.to_string(),
                email: EMAIL.to_string(),
                timestamp: c.at,
            }))
    }

    async fn resolve_revision(&self, reference: &str) -> Result<String, FetchError> {
        self.snapshot(reference).map(|c| c.sha)
    }
}

/// Manifest entry for `{language}/{filename}` under `locales/`
#[must_use]
pub fn entry(language: &str, filename: &str) -> ManifestEntry {
    ManifestEntry {
        filename: filename.to_string(),
        source_filename: format!("locales/{language}/{filename}"),
        language: language.to_string(),
        last_updated: epoch(),
        commit_hash: "0".repeat(40),
        total_keys: None,
    }
}

/// Manifest with an `en` source language
#[must_use]
pub fn manifest(entries: impl IntoIterator<Item = ManifestEntry>) -> Manifest {
    let header = ManifestHeader {
        repository: REPOSITORY.to_string(),
        source_language: "en".to_string(),
        config_version: 1,
    };
    Manifest::new(header, entries)
}

/// Serialized manifest listing `files` as (language, filename) pairs
#[must_use]
pub fn manifest_jsonl(files: &[(&str, &str)]) -> String {
    glossa_manifest::serialize(&manifest(files.iter().map(|(l, f)| entry(l, f))))
}

/// Pretty JSON object of string values
#[must_use]
pub fn json_file(pairs: &[(&str, &str)]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), serde_json::Value::String((*v).to_string())))
        .collect();
    serde_json::to_string_pretty(&map).unwrap()
}

/// Repository with a manifest plus `en` and `ja` `common.json`
#[must_use]
pub fn seeded_repository(en: &[(&str, &str)], ja: &[(&str, &str)]) -> Arc<FakeRepository> {
    let repo = Arc::new(FakeRepository::new());
    let manifest = manifest_jsonl(&[("en", "common.json"), ("ja", "common.json")]);
    let en = json_file(en);
    let ja = json_file(ja);
    repo.commit_files(&[
        (glossa_manifest::MANIFEST_PATH, manifest.as_str()),
        ("locales/en/common.json", en.as_str()),
        ("locales/ja/common.json", ja.as_str()),
    ]);
    repo
}
