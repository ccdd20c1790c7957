//! Counters for stores, thread caches, and whole pools.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-store counters, updated by the store's single writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Blocks handed out by `take_block`.
    pub takes: u64,
    /// Blocks accepted by `return_block`.
    pub returns: u64,
    /// Blocks absorbed by `refill`.
    pub refilled: u64,
    /// `take_block` calls that found the store empty.
    pub exhausted: u64,
}

/// Cache-level statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Takes served from the thread cache.
    pub hits: u64,
    /// Takes that had to go to the central store or the page source.
    pub misses: u64,
    /// Batches pulled into a thread cache.
    pub refills: u64,
    /// Batches pushed back to the central store.
    pub flushes: u64,
}

impl PoolStats {
    /// Add another snapshot into this one.
    pub fn merge(&mut self, other: &PoolStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.refills += other.refills;
        self.flushes += other.flushes;
    }

    /// Fraction of takes served without leaving the thread cache.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Atomic pool statistics for lock-free aggregation across threads.
pub struct AtomicPoolStats {
    hits: AtomicU64,
    misses: AtomicU64,
    refills: AtomicU64,
    flushes: AtomicU64,
}

impl AtomicPoolStats {
    /// Create new zeroed stats.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refills: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    /// Take a snapshot of current stats.
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refills: self.refills.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }

    /// Fold a thread's local counters in.
    pub fn absorb(&self, local: &PoolStats) {
        self.hits.fetch_add(local.hits, Ordering::Relaxed);
        self.misses.fetch_add(local.misses, Ordering::Relaxed);
        self.refills.fetch_add(local.refills, Ordering::Relaxed);
        self.flushes.fetch_add(local.flushes, Ordering::Relaxed);
    }
}

impl Default for AtomicPoolStats {
    fn default() -> Self {
        Self::new()
    }
}
