//! Shared handles for the services
//!
//! Built once at startup and shared behind an `Arc`; everything inside is
//! either immutable or internally synchronized.

use crate::config::{CacheConfig, GlossaConfig, ProjectConfig, SyncConfig};
use crate::error::ServiceError;
use glossa_cache::{FsObjectStore, MemoryObjectStore, ObjectStore, PayloadCache, ReadCache, SharedObjectStore};
use glossa_core::{system_clock, SharedClock};
use glossa_fetch::{HttpFetcher, SharedFetcher};
use glossa_overlay::{MemoryOverlayStore, SharedOverlayStore};
use std::collections::HashMap;
use std::sync::Arc;

/// A configured project and its repository access
#[derive(Debug, Clone)]
pub struct Project {
    pub config: ProjectConfig,
    pub fetcher: SharedFetcher,
}

/// Components shared by [`SyncService`](crate::SyncService) and
/// [`TranslationService`](crate::TranslationService)
#[derive(Debug)]
pub struct ServiceContext {
    projects: HashMap<String, Project>,
    cache: PayloadCache<dyn ObjectStore>,
    overlay: SharedOverlayStore,
    clock: SharedClock,
    sync: SyncConfig,
}

impl ServiceContext {
    #[must_use]
    pub fn new(
        store: SharedObjectStore,
        overlay: SharedOverlayStore,
        clock: SharedClock,
        cache: &CacheConfig,
    ) -> Self {
        let read = ReadCache::new(cache.capacity, cache.ttl(), clock.clone());
        Self {
            projects: HashMap::new(),
            cache: PayloadCache::new(store, read, clock.clone()).with_limits(cache.limits),
            overlay,
            clock,
            sync: SyncConfig::default(),
        }
    }

    /// In-memory stores with default cache settings
    #[must_use]
    pub fn in_memory(clock: SharedClock) -> Self {
        let overlay = Arc::new(MemoryOverlayStore::new(clock.clone()));
        Self::new(Arc::new(MemoryObjectStore::new()), overlay, clock, &CacheConfig::default())
    }

    /// Context for a configuration, one HTTP fetcher per project
    ///
    /// # Errors
    /// Returns error if the object store cannot be opened or a fetcher cannot
    /// be built
    pub async fn from_config(config: &GlossaConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let clock = system_clock();
        let store: SharedObjectStore = match &config.cache.store_dir {
            Some(dir) => Arc::new(FsObjectStore::open(dir).await?),
            None => {
                tracing::warn!("no cache.store_dir configured, payloads are kept in memory");
                Arc::new(MemoryObjectStore::new())
            }
        };
        let overlay = Arc::new(MemoryOverlayStore::new(clock.clone()));

        let mut context = Self::new(store, overlay, clock, &config.cache).with_sync(config.sync);
        for project in &config.projects {
            let fetcher = HttpFetcher::new(&config.fetcher, project.repository.clone())?;
            context = context.with_project(project.clone(), Arc::new(fetcher));
        }
        Ok(context)
    }

    #[inline]
    #[must_use]
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Register a project; a later registration with the same id replaces it
    #[must_use]
    pub fn with_project(mut self, config: ProjectConfig, fetcher: SharedFetcher) -> Self {
        self.projects.insert(config.id.clone(), Project { config, fetcher });
        self
    }

    /// Look up a project
    ///
    /// # Errors
    /// Returns [`ServiceError::UnknownProject`] for unconfigured ids
    pub fn project(&self, id: &str) -> Result<&Project, ServiceError> {
        self.projects
            .get(id)
            .ok_or_else(|| ServiceError::UnknownProject(id.to_string()))
    }

    /// Configured project ids, sorted
    #[must_use]
    pub fn project_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.projects.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn cache(&self) -> &PayloadCache<dyn ObjectStore> {
        &self.cache
    }

    #[must_use]
    pub fn overlay(&self) -> &SharedOverlayStore {
        &self.overlay
    }

    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    #[must_use]
    pub fn sync_config(&self) -> &SyncConfig {
        &self.sync
    }
}
