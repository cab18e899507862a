//! Write-through payload cache
//!
//! `put` writes the packed payload, then its summary, then refreshes the read
//! cache. `get` serves from the read cache and falls back to the object store.

use crate::error::CacheError;
use crate::key::{manifest_key, object_key, project_summary_prefix, summary_key};
use crate::packed::{decode, encode, PackedFilePayload, PayloadLimits};
use crate::read_cache::ReadCache;
use crate::store::ObjectStore;
use crate::summary::FileSummary;
use bytes::Bytes;
use glossa_core::SharedClock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Manifest of the last sync and the revision it was read at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSnapshot {
    pub revision: String,
    /// Serialized JSONL manifest
    pub jsonl: String,
}

/// Packed payloads over an object store
#[derive(Debug)]
pub struct PayloadCache<S: ?Sized> {
    store: Arc<S>,
    read: ReadCache,
    clock: SharedClock,
    limits: PayloadLimits,
}

impl<S: ObjectStore + ?Sized> PayloadCache<S> {
    #[must_use]
    pub fn new(store: Arc<S>, read: ReadCache, clock: SharedClock) -> Self {
        Self {
            store,
            read,
            clock,
            limits: PayloadLimits::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_limits(mut self, limits: PayloadLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Store `payload` for one file, replacing the previous version
    ///
    /// # Errors
    /// Limit violations, encoding failures or object store errors. Nothing is
    /// written when the payload is rejected.
    pub async fn put(
        &self,
        project_id: &str,
        language: &str,
        filename: &str,
        payload: PackedFilePayload,
    ) -> Result<FileSummary, CacheError> {
        let key = object_key(project_id, language, filename);
        let bytes = encode(&payload, &self.limits)?;
        self.store.put(&key, bytes).await?;

        let summary = FileSummary {
            project_id: project_id.to_string(),
            language: language.to_string(),
            filename: filename.to_string(),
            total_keys: payload.len(),
            source_hash: payload.source_hash,
            revision_id: payload.revision_id.clone(),
            updated_at: self.clock.now(),
        };
        let summary_bytes = serde_json::to_vec(&summary).map_err(|e| CacheError::Encode(e.to_string()))?;
        self.store.put(&summary_key(&key), Bytes::from(summary_bytes)).await?;

        self.read.insert(key.clone(), Arc::new(payload)).await;
        tracing::debug!(%key, keys = summary.total_keys, "payload stored");
        Ok(summary)
    }

    /// Payload for one file, `None` when never stored
    ///
    /// # Errors
    /// Object store or decode errors
    pub async fn get(
        &self,
        project_id: &str,
        language: &str,
        filename: &str,
    ) -> Result<Option<Arc<PackedFilePayload>>, CacheError> {
        let key = object_key(project_id, language, filename);
        if let Some(hit) = self.read.get(&key).await {
            tracing::debug!(%key, "read cache hit");
            return Ok(Some(hit));
        }

        let Some(bytes) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let payload = Arc::new(decode(&key, &bytes)?.into_payload()?);
        self.read.insert(key, payload.clone()).await;
        Ok(Some(payload))
    }

    /// Summary of one file
    ///
    /// # Errors
    /// Object store or decode errors
    pub async fn summary(
        &self,
        project_id: &str,
        language: &str,
        filename: &str,
    ) -> Result<Option<FileSummary>, CacheError> {
        let key = summary_key(&object_key(project_id, language, filename));
        match self.store.get(&key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CacheError::decode(key, e)),
            None => Ok(None),
        }
    }

    /// Summaries of every cached file of a project
    ///
    /// Unreadable summaries are skipped with a warning.
    ///
    /// # Errors
    /// Object store errors while listing
    pub async fn summaries(&self, project_id: &str) -> Result<Vec<FileSummary>, CacheError> {
        let keys = self.store.list(&project_summary_prefix(project_id)).await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(bytes) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_slice::<FileSummary>(&bytes) {
                // prefixes can collide ("site" vs "site-b"), the stored id decides
                Ok(summary) if summary.project_id == project_id => out.push(summary),
                Ok(_) => {}
                Err(err) => tracing::warn!(%key, error = %err, "skipping unreadable file summary"),
            }
        }
        Ok(out)
    }

    /// Replace the project's manifest snapshot
    ///
    /// # Errors
    /// Object store or encoding errors
    pub async fn put_manifest(&self, project_id: &str, snapshot: &ManifestSnapshot) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(snapshot).map_err(|e| CacheError::Encode(e.to_string()))?;
        self.store.put(&manifest_key(project_id), Bytes::from(bytes)).await
    }

    /// Last manifest snapshot written for the project
    ///
    /// # Errors
    /// Object store errors, or an undecodable snapshot
    pub async fn manifest(&self, project_id: &str) -> Result<Option<ManifestSnapshot>, CacheError> {
        let key = manifest_key(project_id);
        match self.store.get(&key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CacheError::decode(key, e)),
            None => Ok(None),
        }
    }

    /// Remove one file's payload and summary
    ///
    /// # Errors
    /// Object store errors
    pub async fn delete(&self, project_id: &str, language: &str, filename: &str) -> Result<(), CacheError> {
        let key = object_key(project_id, language, filename);
        self.store.delete(&key).await?;
        self.store.delete(&summary_key(&key)).await?;
        self.read.invalidate(&key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use chrono::{TimeZone, Utc};
    use glossa_core::{ManualClock, SourceHash};
    use std::collections::BTreeMap;

    fn payload(value: &str, revision: &str) -> PackedFilePayload {
        let values = BTreeMap::from([("greeting".to_string(), value.to_string())]);
        let hash = glossa_core::file_hash(&values);
        PackedFilePayload::new(values, Vec::new(), hash, revision, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn cache() -> (PayloadCache<MemoryObjectStore>, Arc<MemoryObjectStore>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));
        let store = Arc::new(MemoryObjectStore::new());
        let read = ReadCache::with_clock(clock.clone());
        (PayloadCache::new(store.clone(), read, clock), store)
    }

    #[tokio::test]
    async fn put_writes_payload_and_summary() {
        let (cache, store) = cache();
        let summary = cache.put("site", "en", "pages/home.json", payload("Hello", "r1")).await.unwrap();
        assert_eq!(summary.total_keys, 1);
        assert_eq!(summary.revision_id, "r1");

        assert!(store.get("site-en-pages-home.json").await.unwrap().is_some());
        assert!(store.get("meta-site-en-pages-home.json").await.unwrap().is_some());
        assert_eq!(cache.summary("site", "en", "pages/home.json").await.unwrap(), Some(summary));
    }

    #[tokio::test]
    async fn cold_and_warm_reads_agree() {
        let (cache, store) = cache();
        let original = payload("Hello", "r1");
        cache.put("site", "en", "common.json", original.clone()).await.unwrap();

        let warm = cache.get("site", "en", "common.json").await.unwrap().unwrap();

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cold_cache = PayloadCache::new(store, ReadCache::with_clock(clock.clone()), clock);
        let cold = cold_cache.get("site", "en", "common.json").await.unwrap().unwrap();

        assert_eq!(*warm, original);
        assert_eq!(*cold, original);
    }

    #[tokio::test]
    async fn put_overwrites_previous_payload() {
        let (cache, _) = cache();
        cache.put("site", "en", "common.json", payload("Hello", "r1")).await.unwrap();
        cache.put("site", "en", "common.json", payload("Hi", "r2")).await.unwrap();
        let got = cache.get("site", "en", "common.json").await.unwrap().unwrap();
        assert_eq!(got.key_values["greeting"], "Hi");
        assert_eq!(got.revision_id, "r2");
        assert_eq!(got.source_hash, glossa_core::file_hash(&got.key_values));
        assert_ne!(got.source_hash, SourceHash::of("Hello"));
    }

    #[tokio::test]
    async fn rejected_payload_writes_nothing() {
        let (cache, store) = cache();
        let cache = cache.with_limits(PayloadLimits {
            max_keys: 0,
            ..PayloadLimits::default()
        });
        let err = cache.put("site", "en", "a.json", payload("x", "r")).await.unwrap_err();
        assert!(err.is_limit());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn summaries_are_scoped_to_project() {
        let (cache, _) = cache();
        cache.put("site", "en", "a.json", payload("a", "r")).await.unwrap();
        cache.put("site", "ja", "a.json", payload("b", "r")).await.unwrap();
        cache.put("site-b", "en", "a.json", payload("c", "r")).await.unwrap();

        let summaries = cache.summaries("site").await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.project_id == "site"));
    }

    #[tokio::test]
    async fn missing_and_deleted_files() {
        let (cache, _) = cache();
        assert!(cache.get("site", "en", "none.json").await.unwrap().is_none());
        cache.put("site", "en", "a.json", payload("a", "r")).await.unwrap();
        cache.delete("site", "en", "a.json").await.unwrap();
        assert!(cache.get("site", "en", "a.json").await.unwrap().is_none());
        assert!(cache.summary("site", "en", "a.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn manifest_snapshot_is_kept_apart_from_summaries() {
        let (cache, store) = cache();
        assert!(cache.manifest("site").await.unwrap().is_none());
        let snapshot = ManifestSnapshot {
            revision: "abc123".to_string(),
            jsonl: "{\"type\":\"header\"}\n".to_string(),
        };
        cache.put_manifest("site", &snapshot).await.unwrap();
        assert_eq!(cache.manifest("site").await.unwrap(), Some(snapshot));
        assert!(cache.summaries("site").await.unwrap().is_empty());

        store.put(&manifest_key("site"), Bytes::from_static(b"not json")).await.unwrap();
        assert!(matches!(cache.manifest("site").await, Err(CacheError::Decode { .. })));
    }
}
