//! Glossa Service
//!
//! Wires the components together:
//!
//! - [`SyncService`]: pinned-revision sync of a project into the cache, with
//!   invalidation of overlay edits whose source text changed
//! - [`TranslationService`]: cached reads, reconciled views, overlay
//!   submissions and status transitions, ETags
//! - [`GlossaConfig`]: TOML configuration
//! - [`RetryPolicy`]: caller-owned backoff around single-attempt fetches
//!
//! # Example
//!
//! ```rust,no_run
//! use glossa_service::{GlossaConfig, ServiceContext, SyncService};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), glossa_service::ServiceError> {
//! let config = GlossaConfig::load("glossa.toml")?;
//! let ctx = Arc::new(ServiceContext::from_config(&config).await?);
//! let report = SyncService::new(ctx).sync("site").await?;
//! println!("{} files synced", report.succeeded.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod retry;
pub mod sync;
pub mod translation;

pub use config::{CacheConfig, GlossaConfig, ProjectConfig, ServerConfig, SyncConfig};
pub use context::{Project, ServiceContext};
pub use error::{ErrorClass, ServiceError};
pub use retry::RetryPolicy;
pub use sync::{FailedFile, SyncReport, SyncService, SyncedFile};
pub use translation::{Submission, TranslationService};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
