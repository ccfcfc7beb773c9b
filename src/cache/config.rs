//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL: Duration = Duration::from_secs(900);
const DEFAULT_MAX_ENTRIES: usize = 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false, every read goes to the store and nothing is cached.
    pub enabled: bool,
    /// Lifetime of a cached view.
    pub ttl: Duration,
    /// Capacity of the in-process store before LRU eviction kicks in.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: settings.ttl,
            max_entries: settings.max_entries.get() as usize,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}
