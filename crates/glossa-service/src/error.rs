//! Error types for the service layer
//!
//! Wraps every component error so callers handle one type. The HTTP layer
//! maps [`ServiceError::status_class`] onto response codes.

use glossa_cache::CacheError;
use glossa_fetch::FetchError;
use glossa_manifest::ManifestError;
use glossa_overlay::OverlayError;

/// Main service error type
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Remote fetch failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Manifest could not be used
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Cache layer failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Overlay store rejected the operation
    #[error("overlay error: {0}")]
    Overlay(#[from] OverlayError),

    /// No configured project with this id
    #[error("unknown project: {0}")]
    UnknownProject(String),

    /// Requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Request is malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File content is not UTF-8
    #[error("file is not valid UTF-8: {path}")]
    Encoding { path: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse error class for transport mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Client sent something unusable (400)
    BadRequest,
    /// Resource missing (404)
    NotFound,
    /// State conflict (409)
    Conflict,
    /// Upstream repository or storage failed (502)
    Upstream,
}

impl ServiceError {
    /// Create invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Check if a retry may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Cache(e) => e.is_retryable(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.status_class(), ErrorClass::NotFound)
    }

    /// Classify for transport mapping
    #[must_use]
    pub fn status_class(&self) -> ErrorClass {
        match self {
            Self::Fetch(e) if e.is_not_found() => ErrorClass::NotFound,
            Self::Overlay(OverlayError::NotFound(_)) | Self::UnknownProject(_) | Self::NotFound(_) => {
                ErrorClass::NotFound
            }
            Self::Overlay(e) if e.is_conflict() => ErrorClass::Conflict,
            Self::InvalidInput(_) | Self::Config(_) => ErrorClass::BadRequest,
            Self::Cache(e) if e.is_limit() => ErrorClass::BadRequest,
            Self::Overlay(_)
            | Self::Fetch(_)
            | Self::Manifest(_)
            | Self::Cache(_)
            | Self::Encoding { .. } => ErrorClass::Upstream,
        }
    }
}
