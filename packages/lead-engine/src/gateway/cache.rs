//! TTL cache of provider responses, shared by every agent of a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

struct Entry {
    value: serde_json::Value,
    /// `None` when the TTL reaches past the clock's range.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Responses keyed by `(provider, normalized query)`.
///
/// Expired entries are never returned: reads evict lazily and
/// [`ResponseCache::sweep`] drops everything that has expired.
pub struct ResponseCache {
    entries: DashMap<(String, String), Entry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for the key, if any.
    pub fn get(&self, provider: &str, key: &str) -> Option<serde_json::Value> {
        let cache_key = (provider.to_string(), key.to_string());
        let now = Instant::now();

        if let Some(entry) = self.entries.get(&cache_key) {
            if entry.is_live(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(provider, key, "cache hit");
                return Some(entry.value.clone());
            }
        }

        if self
            .entries
            .remove_if(&cache_key, |_, entry| !entry.is_live(now))
            .is_some()
        {
            debug!(provider, key, "evicted expired cache entry");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, provider: &str, key: &str, value: serde_json::Value) {
        self.entries.insert(
            (provider.to_string(), key.to_string()),
            Entry {
                value,
                expires_at: Instant::now().checked_add(self.ttl),
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
