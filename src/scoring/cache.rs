//! Time-bounded cache of scored items.
//!
//! Keyed by item id plus a context fingerprint. Expired entries are treated
//! as misses on read and are only removed when overwritten or cleared.

use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::observability::metrics;
use crate::scoring::types::{ScoredItem, ScoringContext};

/// A cached result with its insertion time.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub item: ScoredItem,
    pub inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() < ttl
    }
}

/// Cache statistics for status endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub ttl_secs: u64,
}

/// A thread-safe result cache, owned by exactly one orchestrator.
#[derive(Debug)]
pub struct ResultCache {
    inner: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs))
    }

    /// Deterministic key for an (item, context) pair.
    pub fn key(item_id: &str, context: &ScoringContext) -> String {
        Self::key_with_fingerprint(item_id, &context.fingerprint())
    }

    /// Same as [`ResultCache::key`] when the fingerprint is already known.
    pub fn key_with_fingerprint(item_id: &str, fingerprint: &str) -> String {
        format!("{item_id}:{fingerprint}")
    }

    /// Fresh entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<ScoredItem> {
        self.inner
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.item.clone())
    }

    /// Insert or overwrite with a fresh timestamp.
    pub fn set(&self, key: String, item: ScoredItem) {
        self.inner.insert(
            key,
            CacheEntry {
                item,
                inserted_at: Instant::now(),
            },
        );
        metrics::record_cache_size(self.inner.len());
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = self.inner.len();
        self.inner.clear();
        metrics::record_cache_size(0);
        tracing::info!(removed, "Result cache cleared");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.len(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
