//! Service configuration
//!
//! Loaded from TOML. Every section is optional and falls back to its
//! `Default`; durations are in seconds unless the field name says otherwise.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8787"
//!
//! [fetcher]
//! token = "ghp_..."
//!
//! [cache]
//! store_dir = "/var/lib/glossa"
//!
//! [[projects]]
//! id = "site"
//! repository = "acme/site"
//! ```

use crate::error::ServiceError;
use crate::retry::RetryPolicy;
use glossa_cache::{PayloadLimits, DEFAULT_CAPACITY, DEFAULT_TTL};
use glossa_fetch::{DiscoveryLimits, FetcherConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossaConfig {
    pub server: ServerConfig,
    pub fetcher: FetcherConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub projects: Vec<ProjectConfig>,
}

impl GlossaConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ServiceError::Config`] if the file is unreadable, not valid
    /// TOML or fails validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        tracing::info!(path = %path.display(), projects = config.projects.len(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns [`ServiceError::Config`] on syntax or validation errors
    pub fn from_toml(text: &str) -> Result<Self, ServiceError> {
        let config: Self = toml::from_str(text).map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    /// Returns [`ServiceError::Config`] naming the first problem found
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut ids = HashSet::new();
        for project in &self.projects {
            if project.id.trim().is_empty() {
                return Err(ServiceError::Config("project id must not be empty".into()));
            }
            if !ids.insert(project.id.as_str()) {
                return Err(ServiceError::Config(format!("duplicate project id: {}", project.id)));
            }
            if !project.repository.contains('/') {
                return Err(ServiceError::Config(format!(
                    "project {}: repository must be owner/name, got {:?}",
                    project.id, project.repository
                )));
            }
        }
        if self.sync.concurrency == 0 {
            return Err(ServiceError::Config("sync.concurrency must be at least 1".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn project(&self, id: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.id == id)
    }

    #[inline]
    #[must_use]
    pub fn with_project(mut self, project: ProjectConfig) -> Self {
        self.projects.push(project);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.server.bind = bind.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache.store_dir = Some(dir.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.sync.retry = retry;
        self
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

/// Sync pipeline settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Files processed at once
    pub concurrency: usize,
    pub discovery: DiscoveryLimits,
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            discovery: DiscoveryLimits::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Payload storage and read cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Read cache capacity in payloads
    pub capacity: u64,
    pub ttl_secs: u64,
    /// Filesystem object store root; in-memory when unset
    pub store_dir: Option<PathBuf>,
    pub limits: PayloadLimits,
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl_secs: DEFAULT_TTL.as_secs(),
            store_dir: None,
            limits: PayloadLimits::default(),
        }
    }
}

/// One translated repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProjectConfig {
    pub id: String,
    /// `owner/name`
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    /// Directory holding `{language}/{filename}` when there is no manifest
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
}

impl ProjectConfig {
    /// Project with default branch, source language and layout
    #[must_use]
    pub fn new(id: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repository: repository.into(),
            branch: default_branch(),
            source_language: default_source_language(),
            root: default_root(),
            manifest_path: default_manifest_path(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_source_language(mut self, language: impl Into<String>) -> Self {
        self.source_language = language.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_root() -> String {
    "locales".to_string()
}

fn default_manifest_path() -> String {
    glossa_manifest::MANIFEST_PATH.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(GlossaConfig::from_toml("").unwrap(), GlossaConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = GlossaConfig::from_toml(
            r#"
            [server]
            bind = "0.0.0.0:9000"

            [sync]
            concurrency = 2

            [sync.retry]
            max_attempts = 5

            [cache]
            ttl_secs = 60
            store_dir = "/tmp/glossa"

            [[projects]]
            id = "site"
            repository = "acme/site"
            branch = "release"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.sync.concurrency, 2);
        assert_eq!(config.sync.retry.max_attempts, 5);
        assert_eq!(config.sync.discovery, DiscoveryLimits::default());
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert_eq!(config.cache.capacity, DEFAULT_CAPACITY);

        let project = config.project("site").unwrap();
        assert_eq!(project.branch, "release");
        assert_eq!(project.source_language, "en");
        assert_eq!(project.manifest_path, glossa_manifest::MANIFEST_PATH);
    }

    #[test]
    fn validation_rejects_bad_projects() {
        let dup = GlossaConfig::new()
            .with_project(ProjectConfig::new("site", "acme/site"))
            .with_project(ProjectConfig::new("site", "acme/other"));
        assert!(matches!(dup.validate(), Err(ServiceError::Config(_))));

        let bad_repo = GlossaConfig::new().with_project(ProjectConfig::new("site", "site"));
        assert!(bad_repo.validate().is_err());

        assert!(GlossaConfig::from_toml("[sync]\nconcurrency = 0").is_err());
        assert!(GlossaConfig::from_toml("projects = 3").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glossa.toml");
        std::fs::write(&path, "[[projects]]\nid = \"docs\"\nrepository = \"acme/docs\"\n").unwrap();
        let config = GlossaConfig::load(&path).unwrap();
        assert_eq!(config.projects.len(), 1);
        assert!(GlossaConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
