//! Glossa Server
//!
//! HTTP surface over [`glossa_service::TranslationService`]:
//!
//! - [`routes`]: every endpoint as one warp filter, errors recovered into
//!   JSON `{"error": ...}` bodies
//! - [`telemetry`]: process-wide `tracing` subscriber
//!
//! Read endpoints answer with `ETag` and `Cache-Control` and honour
//! `If-None-Match` with `304 Not Modified`.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod routes;
pub mod telemetry;

pub use error::{recover, reject, ApiError};
pub use routes::{routes, MAX_BODY_BYTES, USER_HEADER};
pub use telemetry::{init_logging, LogFormat};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
