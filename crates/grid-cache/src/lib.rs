//! In-memory LRU cache for fetched daily grids.
//!
//! An explicit, injectable memoization component: keyed by date,
//! LRU-bounded, shared behind `Arc`, with per-date single-flight guards so
//! concurrent requests for the same day trigger at most one remote fetch.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use lru::LruCache;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use sst_common::Grid;

/// Default capacity: roughly two uncached climatology runs.
pub const DEFAULT_CAPACITY: usize = 64;

/// Statistics for the daily grid cache.
///
/// Counters are atomic for lock-free reads from status endpoints.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub insertions: AtomicU64,
}

impl CacheStats {
    /// Cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// LRU cache of fetched grids, keyed by source date.
pub struct DailyGridCache {
    cache: RwLock<LruCache<NaiveDate, Arc<Grid>>>,
    inflight: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
    stats: CacheStats,
    capacity: usize,
}

impl DailyGridCache {
    pub fn new(capacity: usize) -> Self {
        let size = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            cache: RwLock::new(LruCache::new(size)),
            inflight: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
            capacity: capacity.max(1),
        }
    }

    /// Look up the grid for a date.
    pub async fn get(&self, date: NaiveDate) -> Option<Arc<Grid>> {
        let mut cache = self.cache.write().await;
        match cache.get(&date) {
            Some(grid) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(grid.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert the grid for a date, evicting the least recently used entry
    /// when full.
    pub async fn insert(&self, date: NaiveDate, grid: Arc<Grid>) {
        let mut cache = self.cache.write().await;
        cache.put(date, grid);
        self.stats.insertions.fetch_add(1, Ordering::Relaxed);
        debug!(%date, entries = cache.len(), "Cached daily grid");
    }

    /// Acquire the single-flight guard for a date.
    ///
    /// Holders are expected to re-check [`get`](Self::get) after acquiring:
    /// if another task won the race, the grid is already cached and no
    /// remote fetch is needed. Guards for idle dates are pruned as new
    /// guards are handed out.
    pub async fn lock_date(&self, date: NaiveDate) -> OwnedMutexGuard<()> {
        let entry = {
            let mut inflight = self.inflight.lock().await;
            inflight.retain(|_, m| Arc::strong_count(m) > 1);
            inflight
                .entry(date)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }
}

impl Default for DailyGridCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
