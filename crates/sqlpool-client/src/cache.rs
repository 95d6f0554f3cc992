//! LRU cache of prepared statements.
//!
//! The cache owns the statements it holds. [`StatementCache::acquire`] moves a
//! statement out to the caller and [`StatementCache::release`] moves it back,
//! so a statement is never owned by the cache and a caller at the same time.
//! Statements that leave the cache any other way (eviction, duplicate release,
//! clear, reconfiguration) are finalized on the spot.

use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use sqlpool_driver::{ConnectionId, RawStatement, StatementHandle};

use crate::config::StatementCacheConfig;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Statements evicted to make room.
    pub evictions: u64,
    /// Statements currently cached.
    pub len: usize,
    /// Configured capacity.
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache (0.0 to 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

struct CacheInner<S: RawStatement> {
    config: StatementCacheConfig,
    /// `None` while caching is inactive.
    entries: Option<LruCache<String, StatementHandle<S>>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<S: RawStatement> CacheInner<S> {
    fn with_config(config: StatementCacheConfig) -> Self {
        let entries = if config.enabled {
            NonZeroUsize::new(config.capacity).map(LruCache::new)
        } else {
            None
        };
        Self {
            config,
            entries,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }
}

/// Bounded map from SQL text to a prepared statement, evicting the least
/// recently used entry first.
///
/// Keys are the SQL text exactly as given; no whitespace or case
/// normalization is applied.
pub struct StatementCache<S: RawStatement> {
    inner: Mutex<CacheInner<S>>,
}

impl<S: RawStatement> StatementCache<S> {
    /// Create an empty cache.
    #[must_use]
    pub fn new(config: StatementCacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner::with_config(config)),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> StatementCacheConfig {
        self.inner.lock().config
    }

    /// Take the statement cached for `sql`, if any.
    ///
    /// A returned statement has been reset and its bindings cleared. A cached
    /// statement prepared by a connection other than `connection` is finalized
    /// and reported as a miss.
    pub fn acquire(&self, connection: ConnectionId, sql: &str) -> Option<StatementHandle<S>> {
        let mut inner = self.inner.lock();
        let popped = inner.entries.as_mut()?.pop(sql);

        let Some(mut stmt) = popped else {
            inner.misses += 1;
            tracing::trace!(sql, "statement cache miss");
            return None;
        };

        stmt.rewind();
        if stmt.owner() != connection {
            inner.misses += 1;
            tracing::warn!(
                sql,
                expected = %connection,
                actual = %stmt.owner(),
                "discarding cached statement owned by another connection"
            );
            return None;
        }

        inner.hits += 1;
        tracing::trace!(sql, statement_id = %stmt.id(), "statement cache hit");
        Some(stmt)
    }

    /// Hand a statement back to the cache after use.
    ///
    /// The statement is finalized instead of cached when caching is inactive
    /// or `sql` is already cached. When the cache is full, the least recently
    /// used entry is evicted and finalized first.
    pub fn release(&self, sql: &str, stmt: StatementHandle<S>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(entries) = inner.entries.as_mut() else {
            drop(stmt);
            return;
        };
        if entries.contains(sql) {
            tracing::trace!(sql, "duplicate statement released, finalizing");
            drop(stmt);
            return;
        }

        if let Some((evicted_sql, evicted)) = entries.push(sql.to_string(), stmt) {
            inner.evictions += 1;
            tracing::trace!(sql = %evicted_sql, statement_id = %evicted.id(), "evicting statement");
        }
    }

    /// Finalize every cached statement. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let Some(entries) = inner.entries.as_mut() else {
            return 0;
        };
        let count = entries.len();
        entries.clear();
        count
    }

    /// Replace the configuration, finalizing every cached statement.
    pub fn reconfigure(&self, config: StatementCacheConfig) {
        let mut inner = self.inner.lock();
        let (hits, misses, evictions) = (inner.hits, inner.misses, inner.evictions);
        *inner = CacheInner::with_config(config);
        inner.hits = hits;
        inner.misses = misses;
        inner.evictions = evictions;
        tracing::debug!(
            capacity = config.capacity,
            enabled = config.enabled,
            "statement cache reconfigured"
        );
    }

    /// Whether `sql` is cached, without touching recency.
    #[must_use]
    pub fn contains(&self, sql: &str) -> bool {
        self.inner
            .lock()
            .entries
            .as_ref()
            .is_some_and(|entries| entries.contains(sql))
    }

    /// Number of cached statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.as_ref().map_or(0, LruCache::len)
    }

    /// Whether the cache holds no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached SQL keys, most recently used first.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .as_ref()
            .map(|entries| entries.iter().map(|(sql, _)| sql.clone()).collect())
            .unwrap_or_default()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            len: inner.entries.as_ref().map_or(0, LruCache::len),
            capacity: inner.config.capacity,
        }
    }
}

impl<S: RawStatement> Default for StatementCache<S> {
    fn default() -> Self {
        Self::new(StatementCacheConfig::default())
    }
}

impl<S: RawStatement> fmt::Debug for StatementCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("StatementCache")
            .field("len", &stats.len)
            .field("capacity", &stats.capacity)
            .finish()
    }
}
