//! Process-wide pool state.
//!
//! A [`PoolContext`] owns one central store per size class and the page
//! source behind them. It is created explicitly at startup and passed by
//! reference; there is no implicit global, so every test can build and tear
//! down its own pool.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::block::Block;
use crate::cache::ThreadCache;
use crate::central::CentralStore;
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::size_class::SizeClasses;
use crate::source::{BlockSource, CarvedBlocks};
use crate::stats::{AtomicPoolStats, PoolStats, StoreStats};

/// Central stores for every size class plus the page source feeding them.
pub struct PoolContext<S: BlockSource> {
    config: PoolConfig,
    classes: SizeClasses,
    centrals: Vec<CentralStore>,
    carved: Vec<AtomicUsize>,
    source: Mutex<S>,
    stats: AtomicPoolStats,
}

impl<S: BlockSource> PoolContext<S> {
    /// Validate `config` and build empty central stores over `source`.
    pub fn new(config: PoolConfig, source: S) -> Result<Self, PoolError> {
        config.validate()?;
        let classes = SizeClasses::new(&config.size_classes)?;
        let centrals = classes
            .iter()
            .map(|size| CentralStore::new(size, config.policy))
            .collect::<Result<Vec<_>, _>>()?;
        let carved = (0..classes.len()).map(|_| AtomicUsize::new(0)).collect();

        info!(
            classes = classes.len(),
            max_size = classes.max_size(),
            policy = %config.policy,
            "pool context initialized"
        );

        Ok(Self {
            config,
            classes,
            centrals,
            carved,
            source: Mutex::new(source),
            stats: AtomicPoolStats::new(),
        })
    }

    /// The configuration this context was built with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// The size-class table.
    #[must_use]
    pub fn size_classes(&self) -> &SizeClasses {
        &self.classes
    }

    /// Central store of class `class`, if it exists.
    #[must_use]
    pub fn central(&self, class: usize) -> Option<&CentralStore> {
        self.centrals.get(class)
    }

    /// Carve a fresh batch for `class` from the page source.
    pub fn carve(&self, class: usize) -> Result<CarvedBlocks, PoolError> {
        let block_size = self.centrals[class].block_size();
        let blocks = self
            .source
            .lock()
            .acquire_blocks(block_size, self.config.central_batch)
            .inspect_err(|err| warn!(block_size, error = %err, "page source refused to grow"))?;
        self.carved[class].fetch_add(blocks.len(), Ordering::Relaxed);
        debug!(block_size, count = blocks.len(), "carved fresh blocks from page source");
        Ok(blocks)
    }

    /// Take a block of class `class` straight from its central store,
    /// carving a new batch from the page source if the store is empty.
    ///
    /// # Panics
    ///
    /// Panics if `class` is out of range.
    pub fn take_block(&self, class: usize) -> Result<Block, PoolError> {
        let central = &self.centrals[class];
        match central.take_block() {
            Err(PoolError::Exhausted { .. }) => {
                let blocks = self.carve(class)?;
                central.refill_and_take(blocks)
            }
            other => other,
        }
    }

    /// Return a block of class `class` to its central store.
    ///
    /// # Panics
    ///
    /// Panics if `class` is out of range.
    pub fn return_block(&self, class: usize, block: Block) {
        self.centrals[class].return_block(block);
    }

    /// Take a block large enough for `size` bytes.
    pub fn allocate(&self, size: usize) -> Result<Block, PoolError> {
        let class = self.classes.class_for(size)?;
        self.take_block(class)
    }

    /// Return a block obtained from `allocate(size)`.
    ///
    /// A `size` with no class drops the token and reports the error; the
    /// memory then stays outstanding until the source is released.
    pub fn deallocate(&self, size: usize, block: Block) -> Result<(), PoolError> {
        let class = self.classes.class_for(size)?;
        self.return_block(class, block);
        Ok(())
    }

    /// Thread-private caches over this context's central stores. Each worker
    /// thread creates its own; dropping it hands every cached block back.
    pub fn local_caches(&self) -> Result<LocalCaches<'_, S>, PoolError> {
        let caches = self
            .classes
            .iter()
            .map(|size| {
                ThreadCache::new(
                    size,
                    self.config.policy,
                    self.config.cache_batch,
                    self.config.high_watermark,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LocalCaches { ctx: self, caches })
    }

    /// Snapshot of occupancy and counters. Taken class by class, so it is
    /// only exact while no other thread is working on the pool.
    #[must_use]
    pub fn report(&self) -> PoolReport {
        let classes = self
            .centrals
            .iter()
            .zip(&self.carved)
            .map(|(central, carved)| {
                let carved = carved.load(Ordering::Relaxed);
                let central_free = central.count();
                ClassReport {
                    block_size: central.block_size(),
                    carved,
                    central_free,
                    outstanding: carved.saturating_sub(central_free),
                    central_stats: central.stats(),
                }
            })
            .collect();
        PoolReport {
            classes,
            stats: self.stats.snapshot(),
            reserved_bytes: self.source.lock().reserved_bytes(),
        }
    }

    /// Tear the context down and hand the page source back, pages intact.
    ///
    /// The source is never released here. A zero `outstanding` count does
    /// not prove that no block of this source is alive: blocks from another
    /// context may have been returned in place of ones still held. Callers
    /// that know every block is gone release the pages themselves with
    /// [`BlockSource::release_all`].
    pub fn shutdown(self) -> (PoolReport, S) {
        let report = self.report();
        let outstanding = report.outstanding();
        let source = self.source.into_inner();
        if outstanding != 0 {
            warn!(outstanding, "pool shut down with blocks still in use");
        }
        info!(
            carved = report.carved(),
            outstanding,
            reserved_bytes = report.reserved_bytes,
            "pool context shut down"
        );
        (report, source)
    }
}

/// One thread's caches, one per size class.
pub struct LocalCaches<'ctx, S: BlockSource> {
    ctx: &'ctx PoolContext<S>,
    caches: Vec<ThreadCache>,
}

impl<S: BlockSource> LocalCaches<'_, S> {
    /// Take a block of class `class`: thread cache, then central store, then
    /// a fresh batch from the page source.
    ///
    /// # Panics
    ///
    /// Panics if `class` is out of range.
    #[inline]
    pub fn take_block(&mut self, class: usize) -> Result<Block, PoolError> {
        let central = &self.ctx.centrals[class];
        let cache = &mut self.caches[class];
        match cache.take_block(central) {
            Err(PoolError::Exhausted { .. }) => {
                let blocks = self.ctx.carve(class)?;
                cache.refill_and_take(blocks)
            }
            other => other,
        }
    }

    /// Return a block of class `class` to this thread's cache.
    ///
    /// # Panics
    ///
    /// Panics if `class` is out of range.
    #[inline]
    pub fn return_block(&mut self, class: usize, block: Block) {
        self.caches[class].return_block(block, &self.ctx.centrals[class]);
    }

    /// Take a block large enough for `size` bytes.
    pub fn allocate(&mut self, size: usize) -> Result<Block, PoolError> {
        let class = self.ctx.classes.class_for(size)?;
        self.take_block(class)
    }

    /// Return a block obtained from `allocate(size)`.
    pub fn deallocate(&mut self, size: usize, block: Block) -> Result<(), PoolError> {
        let class = self.ctx.classes.class_for(size)?;
        self.return_block(class, block);
        Ok(())
    }

    /// Blocks currently cached across all classes.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.caches.iter().map(ThreadCache::count).sum()
    }

    /// Merged counters of every class.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::default();
        for cache in &self.caches {
            stats.merge(&cache.stats());
        }
        stats
    }
}

impl<S: BlockSource> Drop for LocalCaches<'_, S> {
    fn drop(&mut self) {
        let mut drained = 0usize;
        for (cache, central) in self.caches.iter_mut().zip(&self.ctx.centrals) {
            drained += cache.drain(central);
        }
        self.ctx.stats.absorb(&self.stats());
        trace!(drained, "thread caches retired");
    }
}

/// Occupancy of one size class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassReport {
    /// Block size of the class.
    pub block_size: usize,
    /// Blocks ever carved from the page source.
    pub carved: usize,
    /// Blocks free in the central store.
    pub central_free: usize,
    /// Blocks held by callers or thread caches.
    pub outstanding: usize,
    /// Counters of the central store.
    pub central_stats: StoreStats,
}

/// Snapshot of a whole pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolReport {
    /// Per-class occupancy.
    pub classes: Vec<ClassReport>,
    /// Counters folded in from retired thread caches.
    pub stats: PoolStats,
    /// Bytes the page source has handed out.
    pub reserved_bytes: usize,
}

impl PoolReport {
    /// Blocks carved across all classes.
    #[must_use]
    pub fn carved(&self) -> usize {
        self.classes.iter().map(|c| c.carved).sum()
    }

    /// Blocks free in central stores across all classes.
    #[must_use]
    pub fn free(&self) -> usize {
        self.classes.iter().map(|c| c.central_free).sum()
    }

    /// Blocks not in any central store.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.classes.iter().map(|c| c.outstanding).sum()
    }
}
