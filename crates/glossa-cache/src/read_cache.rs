//! In-process read cache in front of the object store
//!
//! Expendable: a miss only costs an object-store read. Expiry is checked
//! against the injected [`Clock`](glossa_core::Clock) so tests can move time.

use crate::packed::PackedFilePayload;
use chrono::{DateTime, Utc};
use glossa_core::SharedClock;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Default time-to-live for cached payloads
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default number of cached payloads
pub const DEFAULT_CAPACITY: u64 = 1_000;

#[derive(Debug, Clone)]
struct Slot {
    payload: Arc<PackedFilePayload>,
    inserted_at: DateTime<Utc>,
}

/// Capacity-bounded payload cache with clock-checked TTL
#[derive(Debug, Clone)]
pub struct ReadCache {
    inner: Cache<String, Slot>,
    ttl: chrono::Duration,
    clock: SharedClock,
}

impl ReadCache {
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100)),
            clock,
        }
    }

    /// Cache with default capacity and TTL
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL, clock)
    }

    pub async fn insert(&self, key: impl Into<String>, payload: Arc<PackedFilePayload>) {
        let slot = Slot {
            payload,
            inserted_at: self.clock.now(),
        };
        self.inner.insert(key.into(), slot).await;
    }

    /// Cached payload, unless absent or older than the TTL
    pub async fn get(&self, key: &str) -> Option<Arc<PackedFilePayload>> {
        let slot = self.inner.get(key).await?;
        if self.clock.now() - slot.inserted_at >= self.ttl {
            self.inner.invalidate(key).await;
            return None;
        }
        Some(slot.payload)
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}
