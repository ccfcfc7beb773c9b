//! Typed facade over a [`CacheStore`] holding JSON-encoded views.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::store::CacheStore;

const METRIC_HIT: &str = "shelfrate_cache_hit_total";
const METRIC_MISS: &str = "shelfrate_cache_miss_total";
const METRIC_STORE: &str = "shelfrate_cache_store_total";
const METRIC_INVALIDATE: &str = "shelfrate_cache_invalidate_total";
const METRIC_INVALIDATE_FAILED: &str = "shelfrate_cache_invalidate_failed_total";
const METRIC_FILL_SKIPPED: &str = "shelfrate_cache_fill_skipped_total";

/// Invalidation generation observed before a reader went to the database.
///
/// A fill carrying a ticket older than the latest invalidation is dropped, so a view computed
/// before a write commits never outlives that write's invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket(u64);

/// Cache-aside helper used by the services.
///
/// Backend failures never surface to callers: a failed read is a miss, a failed write is
/// skipped, and a failed delete leaves the entry to expire by TTL.
#[derive(Clone)]
pub struct ViewCache {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
    generation: Arc<AtomicU64>,
}

impl ViewCache {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store: config.enabled.then_some(store),
            ttl: config.ttl,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            store: None,
            ttl: Duration::ZERO,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Take before reading the database for a view that will be passed to [`ViewCache::put`].
    pub fn ticket(&self) -> FillTicket {
        FillTicket(self.generation.load(Ordering::Acquire))
    }

    fn is_current(&self, ticket: FillTicket) -> bool {
        self.generation.load(Ordering::Acquire) == ticket.0
    }

    pub async fn get<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let store = self.store.as_ref()?;
        let name = key.to_string();

        let bytes = match store.get(&name).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                counter!(METRIC_MISS, "key" => key.kind()).increment(1);
                return None;
            }
            Err(err) => {
                warn!(target: "shelfrate::cache", key = %name, error = %err, "cache read failed");
                counter!(METRIC_MISS, "key" => key.kind()).increment(1);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                counter!(METRIC_HIT, "key" => key.kind()).increment(1);
                debug!(target: "shelfrate::cache", key = %name, "cache hit");
                Some(value)
            }
            Err(err) => {
                warn!(
                    target: "shelfrate::cache",
                    key = %name,
                    error = %err,
                    "discarding undecodable cache entry"
                );
                counter!(METRIC_MISS, "key" => key.kind()).increment(1);
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: CacheKey, value: &T, ticket: FillTicket) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let name = key.to_string();
        if !self.is_current(ticket) {
            counter!(METRIC_FILL_SKIPPED, "key" => key.kind()).increment(1);
            debug!(target: "shelfrate::cache", key = %name, "view went stale while computing; not cached");
            return;
        }

        let payload = match serde_json::to_vec(value) {
            Ok(payload) => Bytes::from(payload),
            Err(err) => {
                warn!(target: "shelfrate::cache", key = %name, error = %err, "failed to encode view");
                return;
            }
        };

        match store.set(&name, payload, self.ttl).await {
            Ok(()) => {
                counter!(METRIC_STORE, "key" => key.kind()).increment(1);
            }
            Err(err) => {
                warn!(target: "shelfrate::cache", key = %name, error = %err, "cache write failed");
                return;
            }
        }

        // an invalidation may have landed between the check and the write
        if !self.is_current(ticket) {
            counter!(METRIC_FILL_SKIPPED, "key" => key.kind()).increment(1);
            if let Err(err) = store.delete(&name).await {
                warn!(target: "shelfrate::cache", key = %name, error = %err, "failed to drop stale fill");
            }
        }
    }

    /// Drop every key. Must only be called after the write that made them stale has committed.
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        self.generation.fetch_add(1, Ordering::AcqRel);

        for key in keys {
            let name = key.to_string();
            match store.delete(&name).await {
                Ok(()) => {
                    counter!(METRIC_INVALIDATE, "key" => key.kind()).increment(1);
                    debug!(target: "shelfrate::cache", key = %name, "cache entry invalidated");
                }
                Err(err) => {
                    counter!(METRIC_INVALIDATE_FAILED, "key" => key.kind()).increment(1);
                    warn!(
                        target: "shelfrate::cache",
                        key = %name,
                        error = %err,
                        ttl_seconds = self.ttl.as_secs(),
                        "cache invalidation failed; entry will expire by ttl"
                    );
                }
            }
        }
    }
}
