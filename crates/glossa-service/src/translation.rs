//! Read and overlay operations behind the HTTP surface

use crate::context::ServiceContext;
use crate::error::ServiceError;
use crate::sync::SyncService;
use glossa_cache::{sort_summaries, ETag, FileSummary, PackedFilePayload, SortKey, SortOrder};
use glossa_core::SourceHash;
use glossa_fetch::RemoteFetcher;
use glossa_manifest::{Manifest, ProgressIndex, SourceStore};
use glossa_overlay::{
    reconcile, AuditRecord, NewOverlayEntry, OverlayEntry, OverlayError, OverlayFilter, OverlayStatus,
    ReconciledView, RepoValue,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A user's proposed translation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub language: String,
    pub filename: String,
    pub key: String,
    pub value: String,
    /// Source hash the user translated against; the current one when absent
    #[serde(default)]
    pub source_hash: Option<SourceHash>,
}

/// Query-side operations over cache, overlay and repository
#[derive(Debug, Clone)]
pub struct TranslationService {
    ctx: Arc<ServiceContext>,
    sync: SyncService,
}

impl TranslationService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let sync = SyncService::new(ctx.clone());
        Self { ctx, sync }
    }

    #[must_use]
    pub fn sync_service(&self) -> &SyncService {
        &self.sync
    }

    /// Current manifest of a project
    ///
    /// # Errors
    /// Unknown project, or the manifest cannot be obtained
    pub async fn manifest(&self, project_id: &str) -> Result<Manifest, ServiceError> {
        self.ctx.project(project_id)?;
        self.sync.current_manifest(project_id).await
    }

    /// Cached file summaries, sorted
    ///
    /// # Errors
    /// Unknown project or cache failures
    pub async fn files(
        &self,
        project_id: &str,
        sort: SortKey,
        order: SortOrder,
    ) -> Result<Vec<FileSummary>, ServiceError> {
        self.ctx.project(project_id)?;
        let mut summaries = self.ctx.cache().summaries(project_id).await?;
        sort_summaries(&mut summaries, sort, order);
        Ok(summaries)
    }

    /// Payload of one file, fetched live on a cache miss
    ///
    /// `None` when the file is unknown or the live fetch fails.
    ///
    /// # Errors
    /// Unknown project, cache or manifest failures
    pub async fn file(
        &self,
        project_id: &str,
        language: &str,
        filename: &str,
    ) -> Result<Option<Arc<PackedFilePayload>>, ServiceError> {
        self.ctx.project(project_id)?;
        if let Some(payload) = self.ctx.cache().get(project_id, language, filename).await? {
            return Ok(Some(payload));
        }

        match self.sync.sync_file(project_id, language, filename).await {
            Ok(Some(_)) => Ok(self.ctx.cache().get(project_id, language, filename).await?),
            Ok(None) => Ok(None),
            Err(ServiceError::Fetch(err)) => {
                tracing::warn!(project_id, language, filename, error = %err, "live fetch failed");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// ETag of a cached file, from its summary
    ///
    /// # Errors
    /// Cache failures
    pub async fn file_etag(
        &self,
        project_id: &str,
        language: &str,
        filename: &str,
    ) -> Result<Option<ETag>, ServiceError> {
        let summary = self.ctx.cache().summary(project_id, language, filename).await?;
        Ok(ETag::from_timestamps(summary.map(|s| s.updated_at)))
    }

    /// Repository values merged with overlay edits
    ///
    /// `None` when neither the repository nor the overlay knows the file.
    ///
    /// # Errors
    /// Unknown project, cache or manifest failures
    pub async fn reconciled(
        &self,
        project_id: &str,
        language: &str,
        filename: &str,
    ) -> Result<Option<Vec<ReconciledView>>, ServiceError> {
        let payload = self.file(project_id, language, filename).await?;
        let source_language = self.source_language(project_id).await?;
        let source = if language == source_language {
            payload.clone()
        } else {
            self.file(project_id, &source_language, filename).await?
        };

        let entries = self
            .ctx
            .overlay()
            .list(&OverlayFilter::project(project_id).with_language(language).with_filename(filename))
            .await;
        let Some(payload) = payload else {
            if entries.is_empty() {
                return Ok(None);
            }
            return Ok(Some(reconcile(&BTreeMap::new(), &entries)));
        };

        let repo: BTreeMap<String, RepoValue> = payload
            .key_values
            .iter()
            .map(|(key, value)| {
                let hash = source
                    .as_ref()
                    .and_then(|s| s.metadata.get(key))
                    .map_or_else(|| SourceHash::of(value), |m| m.source_hash);
                (key.clone(), RepoValue::new(value.clone(), hash))
            })
            .collect();
        Ok(Some(reconcile(&repo, &entries)))
    }

    /// ETag of a reconciled view
    ///
    /// Covers overlay rows and both the file and its source-language
    /// counterpart, so an overlay write or a resync changes it.
    ///
    /// # Errors
    /// Cache failures
    pub async fn overlay_etag(
        &self,
        project_id: &str,
        language: &str,
        filename: &str,
    ) -> Result<Option<ETag>, ServiceError> {
        let entries = self
            .ctx
            .overlay()
            .list(&OverlayFilter::project(project_id).with_language(language).with_filename(filename))
            .await;
        let source_language = self.source_language(project_id).await?;
        let cache = self.ctx.cache();
        let file = cache.summary(project_id, language, filename).await?;
        let source = cache.summary(project_id, &source_language, filename).await?;

        let stamps = entries
            .iter()
            .map(|e| e.updated_at)
            .chain(file.map(|s| s.updated_at))
            .chain(source.map(|s| s.updated_at));
        Ok(ETag::from_timestamps(stamps))
    }

    /// Record a pending overlay entry
    ///
    /// The entry is valid when the hash it was written against is the key's
    /// current source hash.
    ///
    /// # Errors
    /// `InvalidInput` for empty fields or keys missing from the source file,
    /// `NotFound` when the source file is unknown
    pub async fn submit(
        &self,
        project_id: &str,
        submission: Submission,
        user_id: &str,
    ) -> Result<OverlayEntry, ServiceError> {
        for (field, value) in [
            ("language", submission.language.as_str()),
            ("filename", submission.filename.as_str()),
            ("key", submission.key.as_str()),
            ("user id", user_id),
        ] {
            if value.trim().is_empty() {
                return Err(ServiceError::invalid(format!("{field} must not be empty")));
            }
        }

        let source_language = self.source_language(project_id).await?;
        let source = self
            .file(project_id, &source_language, &submission.filename)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("{source_language}/{}", submission.filename)))?;
        let current = source
            .metadata
            .get(&submission.key)
            .map(|m| m.source_hash)
            .ok_or_else(|| ServiceError::invalid(format!("unknown key: {}", submission.key)))?;

        let hash = submission.source_hash.unwrap_or(current);
        let entry = self
            .ctx
            .overlay()
            .insert(NewOverlayEntry {
                project_id: project_id.to_string(),
                key: submission.key,
                language: submission.language,
                filename: submission.filename,
                value: submission.value,
                submitted_by: user_id.to_string(),
                source_hash_at_submission: hash,
                is_valid: hash == current,
            })
            .await;
        tracing::info!(project_id, id = %entry.id, key = %entry.key, valid = entry.is_valid, "overlay entry submitted");
        Ok(entry)
    }

    /// Approve an entry
    ///
    /// # Errors
    /// `NotFound` for ids outside the project, conflict for disallowed moves
    pub async fn approve(&self, project_id: &str, id: &str, actor: &str) -> Result<OverlayEntry, ServiceError> {
        self.transition(project_id, id, OverlayStatus::Approved, actor).await
    }

    /// Reject an entry
    ///
    /// # Errors
    /// `NotFound` for ids outside the project, conflict for disallowed moves
    pub async fn reject(&self, project_id: &str, id: &str, actor: &str) -> Result<OverlayEntry, ServiceError> {
        self.transition(project_id, id, OverlayStatus::Rejected, actor).await
    }

    /// Soft-delete an entry
    ///
    /// # Errors
    /// `NotFound` for ids outside the project, conflict for disallowed moves
    pub async fn delete(&self, project_id: &str, id: &str, actor: &str) -> Result<OverlayEntry, ServiceError> {
        self.transition(project_id, id, OverlayStatus::Deleted, actor).await
    }

    /// Overlay entries of a project
    ///
    /// # Errors
    /// Unknown project
    pub async fn entries(&self, filter: &OverlayFilter) -> Result<Vec<OverlayEntry>, ServiceError> {
        self.ctx.project(&filter.project_id)?;
        Ok(self.ctx.overlay().list(filter).await)
    }

    /// Validator for a filtered overlay listing
    ///
    /// Covers every row of the project plus the ids the filter matched, so a
    /// row moving out of the filter changes it. `None` when the project has
    /// no overlay rows.
    ///
    /// # Errors
    /// `UnknownProject`
    pub async fn entries_etag(&self, filter: &OverlayFilter) -> Result<Option<ETag>, ServiceError> {
        self.ctx.project(&filter.project_id)?;
        let overlay = self.ctx.overlay();
        let all = overlay.list(&OverlayFilter::project(filter.project_id.as_str())).await;
        let Some(latest) = ETag::from_timestamps(all.iter().map(|e| e.updated_at)) else {
            return Ok(None);
        };

        let mut seed = latest.as_str().to_string();
        for entry in overlay.list(filter).await {
            seed.push('\n');
            seed.push_str(&entry.id);
        }
        Ok(Some(ETag::from_bytes(seed.as_bytes())))
    }

    /// Audit trail of one entry
    ///
    /// # Errors
    /// `NotFound` for ids outside the project
    pub async fn history(&self, project_id: &str, id: &str) -> Result<Vec<AuditRecord>, ServiceError> {
        self.owned_entry(project_id, id).await?;
        Ok(self.ctx.overlay().audit(id).await)
    }

    /// Translated keys per file for one language, from the progress side file
    ///
    /// # Errors
    /// Unknown project or fetch failures other than a missing side file
    pub async fn progress(&self, project_id: &str, language: &str) -> Result<ProgressIndex, ServiceError> {
        let path = glossa_manifest::progress_path(language);
        Ok(self
            .side_file(project_id, &path)
            .await?
            .map(|text| glossa_manifest::parse_progress(&text))
            .unwrap_or_default())
    }

    /// Source key/value snapshots for one language, from the store side file
    ///
    /// # Errors
    /// Unknown project or fetch failures other than a missing side file
    pub async fn store(&self, project_id: &str, language: &str) -> Result<SourceStore, ServiceError> {
        let path = glossa_manifest::store_path(language);
        Ok(self
            .side_file(project_id, &path)
            .await?
            .map(|text| glossa_manifest::parse_store(&text))
            .unwrap_or_default())
    }

    /// Side file text at the branch head; `None` when the repository lacks it
    async fn side_file(&self, project_id: &str, path: &str) -> Result<Option<String>, ServiceError> {
        let project = self.ctx.project(project_id)?;
        let fetcher: &dyn RemoteFetcher = project.fetcher.as_ref();
        let branch = project.config.branch.as_str();
        let retry = self.ctx.sync_config().retry;

        match retry.run(path, move || fetcher.fetch(path, branch)).await {
            Ok(file) => {
                let text = file.text().map_err(|_| ServiceError::Encoding { path: path.to_string() })?;
                Ok(Some(text.to_string()))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn transition(
        &self,
        project_id: &str,
        id: &str,
        to: OverlayStatus,
        actor: &str,
    ) -> Result<OverlayEntry, ServiceError> {
        self.owned_entry(project_id, id).await?;
        let entry = self.ctx.overlay().transition(id, to, Some(actor)).await?;
        tracing::info!(project_id, id, status = %entry.status, actor, "overlay entry updated");
        Ok(entry)
    }

    async fn owned_entry(&self, project_id: &str, id: &str) -> Result<OverlayEntry, ServiceError> {
        self.ctx.project(project_id)?;
        match self.ctx.overlay().get(id).await {
            Some(entry) if entry.project_id == project_id => Ok(entry),
            _ => Err(OverlayError::not_found(id).into()),
        }
    }

    async fn source_language(&self, project_id: &str) -> Result<String, ServiceError> {
        if let Some(manifest) = self.sync.stored_manifest(project_id).await? {
            return Ok(manifest.header().source_language.clone());
        }
        Ok(self.ctx.project(project_id)?.config.source_language.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use glossa_overlay::ReconcileStatus;
    use chrono::Duration;
    use glossa_core::ManualClock;
    use glossa_test_utils::{json_file, manual_clock, seeded_repository, FakeRepository, REPOSITORY};

    fn service_with_clock(repo: Arc<FakeRepository>) -> (TranslationService, Arc<ManualClock>) {
        let clock = manual_clock();
        let ctx = ServiceContext::in_memory(clock.clone()).with_project(ProjectConfig::new("site", REPOSITORY), repo);
        (TranslationService::new(Arc::new(ctx)), clock)
    }

    fn service(repo: Arc<FakeRepository>) -> TranslationService {
        service_with_clock(repo).0
    }

    fn submission(key: &str, value: &str) -> Submission {
        Submission {
            language: "ja".into(),
            filename: "common.json".into(),
            key: key.into(),
            value: value.into(),
            source_hash: None,
        }
    }

    #[tokio::test]
    async fn cache_miss_fetches_live() {
        let repo = seeded_repository(&[("greeting", "Hello")], &[("greeting", "こんにちは")]);
        let service = service(repo.clone());

        let payload = service.file("site", "ja", "common.json").await.unwrap().unwrap();
        assert_eq!(payload.key_values["greeting"], "こんにちは");
        let fetched = repo.fetch_count();

        service.file("site", "ja", "common.json").await.unwrap().unwrap();
        assert_eq!(repo.fetch_count(), fetched);
        assert!(service.file("site", "ja", "missing.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn submit_validates_input() {
        let repo = seeded_repository(&[("greeting", "Hello")], &[]);
        let service = service(repo);

        let err = service.submit("site", submission("greeting", "やあ"), " ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let err = service.submit("site", submission("nope", "x"), "u1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let stale = Submission {
            source_hash: Some(SourceHash::of("Hi")),
            ..submission("greeting", "やあ")
        };
        let entry = service.submit("site", stale, "u1").await.unwrap();
        assert!(!entry.is_valid);
    }

    #[tokio::test]
    async fn transitions_are_scoped_to_project() {
        let repo = seeded_repository(&[("greeting", "Hello")], &[]);
        let service = service(repo);
        let entry = service.submit("site", submission("greeting", "やあ"), "u1").await.unwrap();

        let approved = service.approve("site", &entry.id, "reviewer").await.unwrap();
        assert_eq!(approved.status, OverlayStatus::Approved);
        assert!(matches!(
            service.reject("other", &entry.id, "reviewer").await,
            Err(ServiceError::UnknownProject(_))
        ));

        service.delete("site", &entry.id, "reviewer").await.unwrap();
        let err = service.approve("site", &entry.id, "reviewer").await.unwrap_err();
        assert!(matches!(err, ServiceError::Overlay(ref e) if e.is_conflict()));

        let history = service.history("site", &entry.id).await.unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn reconciled_view_and_etag_track_overlay_writes() {
        let repo = seeded_repository(&[("greeting", "Hello"), ("farewell", "Bye")], &[("farewell", "さようなら")]);
        let (service, clock) = service_with_clock(repo);
        service.sync_service().sync("site").await.unwrap();

        let before = service.overlay_etag("site", "ja", "common.json").await.unwrap();
        assert!(before.is_some());
        clock.advance(Duration::seconds(1));
        service.submit("site", submission("greeting", "こんにちは"), "u1").await.unwrap();
        let after = service.overlay_etag("site", "ja", "common.json").await.unwrap();
        assert_ne!(before, after);

        let views = service.reconciled("site", "ja", "common.json").await.unwrap().unwrap();
        let status: Vec<_> = views.iter().map(|v| (v.key.as_str(), v.status)).collect();
        assert_eq!(
            status,
            vec![("farewell", ReconcileStatus::RepositoryOnly), ("greeting", ReconcileStatus::OverlayPending)]
        );
        assert_eq!(views[0].source_hash, SourceHash::of("Bye"));
    }

    #[tokio::test]
    async fn overlay_etags_are_stable_without_writes() {
        let repo = seeded_repository(&[("greeting", "Hello"), ("farewell", "Bye")], &[]);
        let (service, clock) = service_with_clock(repo);
        service.sync_service().sync("site").await.unwrap();
        service.submit("site", submission("greeting", "こんにちは"), "u1").await.unwrap();

        let first = service.overlay_etag("site", "ja", "common.json").await.unwrap();
        let second = service.overlay_etag("site", "ja", "common.json").await.unwrap();
        assert_eq!(first, second);

        let pending = OverlayFilter::project("site").with_status(OverlayStatus::Pending);
        let listed = service.entries_etag(&pending).await.unwrap();
        assert!(listed.is_some());
        assert_eq!(listed, service.entries_etag(&pending).await.unwrap());
        clock.advance(Duration::seconds(5));
        assert_eq!(listed, service.entries_etag(&pending).await.unwrap());
    }

    #[tokio::test]
    async fn listing_etag_changes_when_a_row_leaves_the_filter() {
        let repo = seeded_repository(&[("greeting", "Hello"), ("farewell", "Bye")], &[]);
        let (service, clock) = service_with_clock(repo);
        service.sync_service().sync("site").await.unwrap();
        let kept = service.submit("site", submission("greeting", "こんにちは"), "u1").await.unwrap();
        clock.advance(Duration::seconds(1));
        let moved = service.submit("site", submission("farewell", "さようなら"), "u1").await.unwrap();
        clock.advance(Duration::seconds(1));
        service.approve("site", &moved.id, "reviewer").await.unwrap();
        clock.advance(Duration::seconds(1));
        service.approve("site", &kept.id, "reviewer").await.unwrap();

        let approved = OverlayFilter::project("site").with_status(OverlayStatus::Approved);
        let before = service.entries_etag(&approved).await.unwrap();
        clock.advance(Duration::seconds(1));
        service.delete("site", &moved.id, "reviewer").await.unwrap();
        let after = service.entries_etag(&approved).await.unwrap();
        assert_ne!(before, after);
        assert!(service.entries_etag(&OverlayFilter::project("nobody")).await.is_err());
    }

    #[tokio::test]
    async fn progress_side_file_is_optional() {
        let repo = seeded_repository(&[("greeting", "Hello")], &[]);
        let service = service(repo.clone());
        assert!(service.progress("site", "ja").await.unwrap().is_empty());

        let record = r#"{"type":"file","filepath":"locales/ja/common.json","keys":["greeting"]}"#;
        repo.commit_files(&[(".glossa/progress-translated/ja.jsonl", record)]);
        let progress = service.progress("site", "ja").await.unwrap();
        assert!(progress.is_translated("locales/ja/common.json", "greeting"));
    }

    #[tokio::test]
    async fn store_side_file_merges_chunks() {
        let repo = seeded_repository(&[("greeting", "Hello")], &[]);
        let service = service(repo.clone());
        assert!(service.store("site", "en").await.unwrap().is_empty());

        let records = concat!(
            r#"{"type":"chunk","filepath":"locales/en/common.json","chunkIndex":1,"totalChunks":2,"entries":{"farewell":"Bye"}}"#,
            "\n",
            r#"{"type":"chunk","filepath":"locales/en/common.json","chunkIndex":0,"totalChunks":2,"entries":{"greeting":"Hello"}}"#,
            "\n",
        );
        repo.commit_files(&[(".glossa/store/en.jsonl", records)]);
        let store = service.store("site", "en").await.unwrap();
        let entries = store.entries("locales/en/common.json").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["farewell"], "Bye");

        repo.fail_path(".glossa/store/ja.jsonl", glossa_fetch::FetchError::Unknown("denied".into()));
        assert!(service.store("site", "ja").await.is_err());
        assert!(matches!(service.store("other", "en").await, Err(ServiceError::UnknownProject(_))));
    }

    #[tokio::test]
    async fn files_follow_manifest_and_sort() {
        let repo = seeded_repository(&[("greeting", "Hello"), ("farewell", "Bye")], &[("greeting", "やあ")]);
        let extra = json_file(&[("title", "Docs")]);
        repo.commit_files(&[("locales/en/docs.json", extra.as_str())]);
        let service = service(repo);
        service.sync_service().sync("site").await.unwrap();

        let files = service.files("site", SortKey::TotalKeys, SortOrder::Desc).await.unwrap();
        assert_eq!(files[0].total_keys, 2);
        assert_eq!(files.len(), 2);
    }
}
