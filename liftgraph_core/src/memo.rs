//! Bounded memoization cache for parsed records.
//!
//! Entries are keyed by raw record id. Records are immutable, so an entry
//! never goes stale; the only reason to drop one is capacity, and the
//! oldest-inserted entry goes first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Default number of parsed records kept in memory.
pub const DEFAULT_CAPACITY: usize = 1000;

// =============================================================================
// Cache Statistics
// =============================================================================

/// Live hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

impl CacheStatsSnapshot {
    /// Hit rate between 0.0 and 1.0.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Memo Cache
// =============================================================================

struct Entries<V> {
    values: HashMap<String, V>,
    order: VecDeque<String>,
}

/// Thread-safe bounded memo keyed by record id.
pub struct MemoCache<V> {
    entries: Mutex<Entries<V>>,
    capacity: usize,
    stats: CacheStats,
}

impl<V: Clone> MemoCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries {
                values: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Return the memoized value for `key`, computing it with `compute` on a miss.
    ///
    /// `compute` runs without the lock held. If another caller inserted the
    /// same key meanwhile, their value is kept and returned so every caller
    /// observes one value per key.
    pub fn get_or_insert_with<F>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.lock().values.get(key) {
            self.stats.record_hit();
            return value.clone();
        }

        self.stats.record_miss();
        let computed = compute();

        let mut entries = self.lock();
        if let Some(existing) = entries.values.get(key) {
            return existing.clone();
        }

        while entries.values.len() >= self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            if entries.values.remove(&oldest).is_some() {
                self.stats.record_eviction();
                tracing::trace!("Evicted {} from parse cache", oldest);
            }
        }

        entries.values.insert(key.to_string(), computed.clone());
        entries.order.push_back(key.to_string());
        self.stats.record_insert();
        computed
    }

    /// Look up without computing. Does not touch the counters.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.lock().values.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.values.clear();
        entries.order.clear();
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, Entries<V>> {
        // Entries are immutable once inserted, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
