//! Per-thread free store with batched exchange against a central store.
//!
//! The fast path (`take_block` with a non-empty cache, `return_block` below
//! the high watermark) touches only the private store and never locks.

use tracing::trace;

use crate::block::Block;
use crate::central::CentralStore;
use crate::error::PoolError;
use crate::policy::ReusePolicy;
use crate::stats::PoolStats;
use crate::store::FreeStore;

/// Thread-private cache for one size class.
#[derive(Debug)]
pub struct ThreadCache {
    local: FreeStore,
    batch: usize,
    high_watermark: usize,
    stats: PoolStats,
}

impl ThreadCache {
    /// Create an empty cache.
    ///
    /// `batch` blocks are pulled from the central store on a miss; when more
    /// than `high_watermark` blocks are cached, the cache is trimmed back to
    /// `batch`.
    pub fn new(
        block_size: usize,
        policy: ReusePolicy,
        batch: usize,
        high_watermark: usize,
    ) -> Result<Self, PoolError> {
        if batch == 0 {
            return Err(PoolError::Config("thread-cache batch must be at least 1".into()));
        }
        if high_watermark < batch {
            return Err(PoolError::Config(format!(
                "high watermark {high_watermark} is below the batch size {batch}"
            )));
        }
        Ok(Self {
            local: FreeStore::new(block_size, policy)?,
            batch,
            high_watermark,
            stats: PoolStats::default(),
        })
    }

    /// Take a block, pulling a batch from `central` when the cache is empty.
    ///
    /// Returns [`PoolError::Exhausted`] when `central` is empty too; the
    /// caller then refills from the page source.
    #[inline]
    pub fn take_block(&mut self, central: &CentralStore) -> Result<Block, PoolError> {
        if self.local.is_empty() {
            self.stats.misses += 1;
            let moved = central.fill(&mut self.local, self.batch);
            if moved > 0 {
                self.stats.refills += 1;
                trace!(
                    block_size = self.local.block_size(),
                    moved,
                    "thread cache refilled from central store"
                );
            }
        } else {
            self.stats.hits += 1;
        }
        self.local.take_block()
    }

    /// Return a block, flushing the least recently freed excess to
    /// `central` once the cache grows past its high watermark.
    #[inline]
    pub fn return_block(&mut self, block: Block, central: &CentralStore) {
        self.local.return_block(block);
        if self.local.count() > self.high_watermark {
            let excess = self.local.count() - self.batch;
            let moved = central.flush(&mut self.local, excess);
            self.stats.flushes += 1;
            trace!(
                block_size = self.local.block_size(),
                moved,
                "thread cache flushed to central store"
            );
        }
    }

    /// Absorb a fresh batch and take one block from it. Used after both the
    /// cache and the central store came up empty, so it counts as part of
    /// the miss already recorded.
    pub fn refill_and_take<I>(&mut self, blocks: I) -> Result<Block, PoolError>
    where
        I: IntoIterator<Item = Block>,
    {
        self.local.refill(blocks);
        self.local.take_block()
    }

    /// Hand every cached block back to `central`.
    pub fn drain(&mut self, central: &CentralStore) -> usize {
        central.absorb(&mut self.local)
    }

    /// Number of cached blocks.
    #[must_use]
    pub fn count(&self) -> usize {
        self.local.count()
    }

    /// Block size of this cache.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.local.block_size()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
