//! Repository sync pipeline
//!
//! # Flow
//!
//! ```text
//! resolve branch ──► manifest @ sha ──► per entry (bounded):
//!   (pinned revision)  │ (NotFound:       fetch ∥ blame ─► metadata ─► cache.put
//!                      │  discovery)
//!                      └─────────────────────────────────────────────► invalidation
//!                                                       (source-language files)
//! ```
//!
//! Every fetch of one sync uses the SHA resolved at the start. A failing file
//! is reported and leaves its previously cached payload untouched.

use crate::context::{Project, ServiceContext};
use crate::error::ServiceError;
use futures::stream::{self, StreamExt};
use glossa_cache::{FileSummary, ManifestSnapshot};
use glossa_core::SourceHash;
use glossa_fetch::{discover, infer_entries, FailedDir, RemoteFetcher};
use glossa_manifest::{Manifest, ManifestEntry, ManifestHeader};
use glossa_metadata::{try_build, FileMetadata};
use glossa_overlay::InvalidationService;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a full sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub project_id: String,
    /// Pinned commit SHA
    pub revision: String,
    /// No manifest in the repository; entries came from discovery
    pub bootstrapped: bool,
    /// Discovery hit a limit or left directories out
    pub truncated: bool,
    pub succeeded: Vec<SyncedFile>,
    pub failed: Vec<FailedFile>,
    /// Directories discovery could not list after retries
    pub failed_dirs: Vec<FailedDir>,
    /// Overlay entries invalidated by this sync
    pub invalidated: usize,
}

impl SyncReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.failed_dirs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedFile {
    pub language: String,
    pub filename: String,
    pub total_keys: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub language: String,
    pub filename: String,
    pub error: String,
}

/// Manifest used by one sync
#[derive(Debug, Clone)]
struct LoadedManifest {
    manifest: Manifest,
    bootstrapped: bool,
    truncated: bool,
    failed_dirs: Vec<FailedDir>,
}

/// One processed file
#[derive(Debug)]
struct Processed {
    summary: FileSummary,
    /// Per-key hashes; `None` when the content did not parse
    hashes: Option<HashMap<String, SourceHash>>,
}

/// Pulls repository content into the cache
#[derive(Debug, Clone)]
pub struct SyncService {
    ctx: Arc<ServiceContext>,
}

impl SyncService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Sync every file of a project at the head of its branch
    ///
    /// # Errors
    /// Fails only when the revision or the manifest cannot be obtained;
    /// per-file failures are listed in [`SyncReport::failed`]
    pub async fn sync(&self, project_id: &str) -> Result<SyncReport, ServiceError> {
        let project = self.ctx.project(project_id)?;
        let revision = self.resolve(project).await?;
        tracing::info!(project_id, %revision, "sync started");

        let loaded = self.load_manifest(project, &revision).await?;
        self.store_manifest(project_id, &revision, &loaded.manifest).await?;

        let concurrency = self.ctx.sync_config().concurrency.max(1);
        let revision_ref = revision.as_str();
        let results: Vec<(ManifestEntry, Result<Processed, ServiceError>)> =
            stream::iter(loaded.manifest.entries().to_vec())
                .map(|entry| async move {
                    let outcome = self.process(project, revision_ref, &entry).await;
                    (entry, outcome)
                })
                .buffer_unordered(concurrency)
                .boxed()
                .collect()
                .await;

        let source_language = &loaded.manifest.header().source_language;
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut stale_checks = Vec::new();
        for (entry, result) in results {
            match result {
                Ok(processed) => {
                    succeeded.push(SyncedFile {
                        language: entry.language.clone(),
                        filename: entry.filename.clone(),
                        total_keys: processed.summary.total_keys,
                    });
                    if entry.language == *source_language {
                        if let Some(hashes) = processed.hashes {
                            stale_checks.push((entry.filename.clone(), hashes));
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        project_id,
                        language = %entry.language,
                        filename = %entry.filename,
                        error = %err,
                        "file sync failed"
                    );
                    failed.push(FailedFile {
                        language: entry.language.clone(),
                        filename: entry.filename.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        succeeded.sort_by(|a, b| (&a.language, &a.filename).cmp(&(&b.language, &b.filename)));
        failed.sort_by(|a, b| (&a.language, &a.filename).cmp(&(&b.language, &b.filename)));

        let mut invalidated = 0;
        for (filename, hashes) in &stale_checks {
            invalidated += self.invalidate(project_id, filename, hashes).await;
        }

        tracing::info!(
            project_id,
            %revision,
            succeeded = succeeded.len(),
            failed = failed.len(),
            failed_dirs = loaded.failed_dirs.len(),
            invalidated,
            "sync finished"
        );
        Ok(SyncReport {
            project_id: project_id.to_string(),
            revision,
            bootstrapped: loaded.bootstrapped,
            truncated: loaded.truncated,
            succeeded,
            failed,
            failed_dirs: loaded.failed_dirs,
            invalidated,
        })
    }

    /// Fetch one file live and cache it
    ///
    /// Fetches at the revision pinned by the last sync so the file matches its
    /// siblings; without a prior sync the branch head is pinned first. Returns
    /// `None` when the manifest does not list the file or the repository has
    /// no such path at that revision.
    ///
    /// # Errors
    /// Revision, manifest or cache failures
    pub async fn sync_file(
        &self,
        project_id: &str,
        language: &str,
        filename: &str,
    ) -> Result<Option<FileSummary>, ServiceError> {
        let project = self.ctx.project(project_id)?;
        let (revision, manifest) = self.pinned_manifest(project).await?;
        let Some(entry) = manifest.find_entry(language, filename) else {
            return Ok(None);
        };

        let processed = match self.process(project, &revision, entry).await {
            Ok(processed) => processed,
            Err(ServiceError::Fetch(err)) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        if language == manifest.header().source_language {
            if let Some(hashes) = &processed.hashes {
                self.invalidate(project_id, filename, hashes).await;
            }
        }
        Ok(Some(processed.summary))
    }

    /// Manifest written by the last sync
    ///
    /// # Errors
    /// Cache failures or an unparsable snapshot
    pub async fn stored_manifest(&self, project_id: &str) -> Result<Option<Manifest>, ServiceError> {
        Ok(self.stored_snapshot(project_id).await?.map(|(_, manifest)| manifest))
    }

    /// Manifest of the last sync, or the branch head's when never synced
    ///
    /// # Errors
    /// Revision, manifest or cache failures
    pub async fn current_manifest(&self, project_id: &str) -> Result<Manifest, ServiceError> {
        let project = self.ctx.project(project_id)?;
        Ok(self.pinned_manifest(project).await?.1)
    }

    async fn stored_snapshot(&self, project_id: &str) -> Result<Option<(String, Manifest)>, ServiceError> {
        match self.ctx.cache().manifest(project_id).await? {
            Some(snapshot) => {
                let manifest = glossa_manifest::parse(&snapshot.jsonl)?;
                Ok(Some((snapshot.revision, manifest)))
            }
            None => Ok(None),
        }
    }

    /// Stored snapshot with its revision, or the branch head pinned and stored
    async fn pinned_manifest(&self, project: &Project) -> Result<(String, Manifest), ServiceError> {
        if let Some(pinned) = self.stored_snapshot(&project.config.id).await? {
            return Ok(pinned);
        }
        let revision = self.resolve(project).await?;
        let loaded = self.load_manifest(project, &revision).await?;
        self.store_manifest(&project.config.id, &revision, &loaded.manifest).await?;
        Ok((revision, loaded.manifest))
    }

    async fn store_manifest(&self, project_id: &str, revision: &str, manifest: &Manifest) -> Result<(), ServiceError> {
        let snapshot = ManifestSnapshot {
            revision: revision.to_string(),
            jsonl: glossa_manifest::serialize(manifest),
        };
        Ok(self.ctx.cache().put_manifest(project_id, &snapshot).await?)
    }

    async fn resolve(&self, project: &Project) -> Result<String, ServiceError> {
        let fetcher: &dyn RemoteFetcher = project.fetcher.as_ref();
        let branch = project.config.branch.as_str();
        let retry = self.ctx.sync_config().retry;
        Ok(retry.run(branch, move || fetcher.resolve_revision(branch)).await?)
    }

    async fn load_manifest(&self, project: &Project, revision: &str) -> Result<LoadedManifest, ServiceError> {
        let fetcher: &dyn RemoteFetcher = project.fetcher.as_ref();
        let path = project.config.manifest_path.as_str();
        let retry = self.ctx.sync_config().retry;

        match retry.run(path, move || fetcher.fetch(path, revision)).await {
            Ok(file) => {
                let text = file.text().map_err(|_| ServiceError::Encoding { path: path.to_string() })?;
                Ok(LoadedManifest {
                    manifest: glossa_manifest::parse(text)?,
                    bootstrapped: false,
                    truncated: false,
                    failed_dirs: Vec::new(),
                })
            }
            Err(err) if err.is_not_found() => self.bootstrap(project, revision).await,
            Err(err) => Err(err.into()),
        }
    }

    async fn bootstrap(&self, project: &Project, revision: &str) -> Result<LoadedManifest, ServiceError> {
        let root = project.config.root.as_str();
        tracing::info!(project_id = %project.config.id, root, "no manifest, discovering files");

        let limits = self.ctx.sync_config().discovery;
        let fetcher: &dyn RemoteFetcher = project.fetcher.as_ref();
        let retry = self.ctx.sync_config().retry;
        let discovery = discover(root, &limits, move |dir: String| async move {
            let path = dir.as_str();
            retry.run(path, move || fetcher.list_dir(path, revision)).await
        })
        .await?;
        if !discovery.failed_dirs.is_empty() {
            tracing::warn!(
                project_id = %project.config.id,
                failed = discovery.failed_dirs.len(),
                "discovery left directories out"
            );
        }
        let entries = infer_entries(&discovery.files, root, revision, self.ctx.clock().now());
        let header = ManifestHeader {
            repository: project.config.repository.clone(),
            source_language: project.config.source_language.clone(),
            config_version: 0,
        };
        Ok(LoadedManifest {
            manifest: Manifest::new(header, entries),
            bootstrapped: true,
            truncated: discovery.truncated,
            failed_dirs: discovery.failed_dirs,
        })
    }

    async fn process(
        &self,
        project: &Project,
        revision: &str,
        entry: &ManifestEntry,
    ) -> Result<Processed, ServiceError> {
        let fetcher: &dyn RemoteFetcher = project.fetcher.as_ref();
        let path = entry.source_filename.as_str();
        let retry = self.ctx.sync_config().retry;

        let (file, blame) = tokio::join!(
            retry.run(path, move || fetcher.fetch(path, revision)),
            retry.run(path, move || fetcher.latest_commit(path, revision)),
        );
        let file = file?;
        let blame = blame.unwrap_or_else(|err| {
            tracing::warn!(path, error = %err, "blame lookup failed, keys left unattributed");
            None
        });

        let text = file.text().map_err(|_| ServiceError::Encoding { path: path.to_string() })?;
        let (metadata, hashes) = match try_build(path, text, blame.as_ref()) {
            Ok(metadata) => {
                let hashes = metadata.hashes();
                (metadata, Some(hashes))
            }
            Err(err) => {
                tracing::warn!(path, error = %err, "unparsable translation file, no keys extracted");
                (FileMetadata::default(), None)
            }
        };

        let FileMetadata {
            values,
            keys,
            source_hash,
        } = metadata;
        let payload = glossa_cache::PackedFilePayload::new(values, keys, source_hash, revision, self.ctx.clock().now());
        let summary = self
            .ctx
            .cache()
            .put(&project.config.id, &entry.language, &entry.filename, payload)
            .await?;
        Ok(Processed { summary, hashes })
    }

    async fn invalidate(&self, project_id: &str, filename: &str, hashes: &HashMap<String, SourceHash>) -> usize {
        InvalidationService::new(self.ctx.overlay().clone())
            .run(project_id, None, filename, hashes)
            .await
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProjectConfig, SyncConfig};
    use crate::retry::RetryPolicy;
    use glossa_cache::ObjectStore;
    use glossa_fetch::FetchError;
    use glossa_test_utils::{json_file, manual_clock, seeded_repository, FakeRepository, REPOSITORY};

    fn service(repo: Arc<FakeRepository>) -> SyncService {
        let sync = SyncConfig {
            retry: RetryPolicy::default().with_base_delay(std::time::Duration::from_millis(1)),
            ..SyncConfig::default()
        };
        let ctx = ServiceContext::in_memory(manual_clock())
            .with_sync(sync)
            .with_project(ProjectConfig::new("site", REPOSITORY), repo);
        SyncService::new(Arc::new(ctx))
    }

    fn unmanifested_repository() -> Arc<FakeRepository> {
        let repo = Arc::new(FakeRepository::new());
        let en = json_file(&[("greeting", "Hello")]);
        let ja = json_file(&[("greeting", "こんにちは")]);
        repo.commit_files(&[
            ("locales/en/common.json", en.as_str()),
            ("locales/ja/common.json", ja.as_str()),
            ("locales/README", "not a translation"),
        ]);
        repo
    }

    #[tokio::test]
    async fn sync_caches_every_manifest_file() {
        let repo = seeded_repository(&[("greeting", "Hello"), ("farewell", "Bye")], &[("greeting", "こんにちは")]);
        let service = service(repo.clone());

        let report = service.sync("site").await.unwrap();
        assert!(report.is_complete());
        assert!(!report.bootstrapped);
        assert_eq!(report.revision, repo.head().unwrap());
        assert_eq!(
            report.succeeded,
            vec![
                SyncedFile {
                    language: "en".into(),
                    filename: "common.json".into(),
                    total_keys: 2
                },
                SyncedFile {
                    language: "ja".into(),
                    filename: "common.json".into(),
                    total_keys: 1
                },
            ]
        );

        let payload = service.ctx.cache().get("site", "ja", "common.json").await.unwrap().unwrap();
        assert_eq!(payload.key_values["greeting"], "こんにちは");
        assert_eq!(payload.revision_id, report.revision);
        let blame = payload.metadata["greeting"].blame.clone().unwrap();
        assert_eq!(blame.revision_id, report.revision);
    }

    #[tokio::test]
    async fn failed_file_keeps_previous_payload() {
        let repo = seeded_repository(&[("greeting", "Hello")], &[("greeting", "こんにちは")]);
        let service = service(repo.clone());
        service.sync("site").await.unwrap();

        let ja = json_file(&[("greeting", "やあ")]);
        repo.commit_files(&[("locales/ja/common.json", ja.as_str())]);
        repo.fail_path("locales/ja/common.json", FetchError::not_found("locales/ja/common.json"));

        let report = service.sync("site").await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].language, "ja");
        assert_eq!(report.succeeded.len(), 1);

        let payload = service.ctx.cache().get("site", "ja", "common.json").await.unwrap().unwrap();
        assert_eq!(payload.key_values["greeting"], "こんにちは");
    }

    #[tokio::test]
    async fn missing_manifest_bootstraps_from_directories() {
        let service = service(unmanifested_repository());

        let report = service.sync("site").await.unwrap();
        assert!(report.bootstrapped);
        assert!(report.is_complete());
        assert_eq!(report.succeeded.len(), 2);

        let manifest = service.stored_manifest("site").await.unwrap().unwrap();
        assert_eq!(manifest.header().source_language, "en");
        assert!(manifest.find_entry("ja", "common.json").is_some());
    }

    #[tokio::test]
    async fn rate_limited_directory_is_listed_on_retry() {
        let repo = unmanifested_repository();
        repo.fail_path_times("locales/ja", FetchError::RateLimited { retry_after: None }, 2);
        let service = service(repo);

        let report = service.sync("site").await.unwrap();
        assert!(report.is_complete());
        assert!(!report.truncated);
        assert!(report.succeeded.iter().any(|f| f.language == "ja"));
    }

    #[tokio::test]
    async fn unlistable_directory_is_reported() {
        let repo = unmanifested_repository();
        repo.fail_path("locales/ja", FetchError::RateLimited { retry_after: None });
        let service = service(repo);

        let report = service.sync("site").await.unwrap();
        assert!(report.bootstrapped);
        assert!(report.truncated);
        assert!(!report.is_complete());
        assert_eq!(report.failed_dirs.len(), 1);
        assert_eq!(report.failed_dirs[0].path, "locales/ja");
        assert_eq!(
            report.succeeded.iter().map(|f| f.language.as_str()).collect::<Vec<_>>(),
            vec!["en"]
        );
    }

    #[tokio::test]
    async fn unparsable_file_is_cached_empty() {
        let repo = seeded_repository(&[("greeting", "Hello")], &[]);
        repo.commit_files(&[("locales/ja/common.json", "{ broken")]);
        let service = service(repo);

        let report = service.sync("site").await.unwrap();
        assert!(report.is_complete());
        let ja = report.succeeded.iter().find(|f| f.language == "ja").unwrap();
        assert_eq!(ja.total_keys, 0);
    }

    #[tokio::test]
    async fn sync_file_fetches_one_entry() {
        let repo = seeded_repository(&[("greeting", "Hello")], &[("greeting", "こんにちは")]);
        let service = service(repo.clone());

        let summary = service.sync_file("site", "en", "common.json").await.unwrap().unwrap();
        assert_eq!(summary.total_keys, 1);
        assert!(service.sync_file("site", "fr", "common.json").await.unwrap().is_none());
        assert!(service.ctx.cache().store().get("site-ja-common.json").await.unwrap().is_none());
    }

    fn assert_send<T: Send>(_: T) {}

    #[tokio::test]
    async fn sync_file_fetches_at_pinned_revision() {
        let repo = seeded_repository(&[("greeting", "Hello")], &[("greeting", "こんにちは")]);
        let service = service(repo.clone());
        let report = service.sync("site").await.unwrap();

        repo.commit([("locales/ja/common.json", None::<Vec<u8>>)]);
        service.ctx.cache().delete("site", "ja", "common.json").await.unwrap();

        let summary = service.sync_file("site", "ja", "common.json").await.unwrap().unwrap();
        assert_eq!(summary.total_keys, 1);
        let payload = service.ctx.cache().get("site", "ja", "common.json").await.unwrap().unwrap();
        assert_eq!(payload.revision_id, report.revision);
        assert_eq!(payload.key_values["greeting"], "こんにちは");
    }

    #[tokio::test]
    async fn sync_futures_are_send() {
        let service = service(seeded_repository(&[("greeting", "Hello")], &[]));
        assert_send(service.sync("site"));
        assert_send(service.sync_file("site", "en", "common.json"));
    }

    #[tokio::test]
    async fn unknown_project_is_rejected() {
        let service = service(Arc::new(FakeRepository::new()));
        assert!(matches!(service.sync("other").await, Err(ServiceError::UnknownProject(_))));
    }
}
