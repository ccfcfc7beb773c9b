//! Key-value stores backing the view cache.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use thiserror::Error;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation `{op}` failed: {message}")]
    Operation { op: &'static str, message: String },
}

/// Minimal cache contract: `get`, `set` with a TTL and `delete`.
///
/// Implementations may be remote, so every call can fail; callers treat failures as misses.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

struct Entry {
    value: Bytes,
    expires_at: Instant,
}

/// In-process store with per-entry expiry and LRU eviction beyond `max_entries`.
pub struct MemoryCacheStore {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, "memory.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut entries = rw_write(&self.entries, "memory.get");
        let now = Instant::now();
        let lookup = entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));
        match lookup {
            None => Ok(None),
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                entries.pop(key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Operation {
                op: "set",
                message: format!("ttl {ttl:?} overflows the clock"),
            })?;
        rw_write(&self.entries, "memory.set").put(key.to_owned(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, "memory.delete").pop(key);
        Ok(())
    }
}
