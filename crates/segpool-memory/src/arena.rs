//! Bump arena that carves chunks into fixed-size blocks.
//!
//! Uses bumpalo so that growing a size class is one pointer bump. Blocks
//! are never given back one at a time; the whole arena is released at once
//! with [`BlockSource::release_all`]. Dropping an arena that still has
//! carved chunks leaks them, since a block token may still point inside.

use std::alloc::Layout;
use std::mem::ManuallyDrop;

use bumpalo::Bump;
use tracing::{debug, info, warn};

use segpool_core::{BlockSource, CarvedBlocks, FreeStore, PoolError};

/// Alignment of every chunk the arena hands out.
pub const CHUNK_ALIGN: usize = 16;

/// Page source backed by a bump arena, with an optional byte limit.
pub struct PageArena {
    bump: ManuallyDrop<Bump>,
    limit: Option<usize>,
    reserved: usize,
    chunks: usize,
}

impl PageArena {
    /// Create an unlimited arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bump: ManuallyDrop::new(Bump::new()),
            limit: None,
            reserved: 0,
            chunks: 0,
        }
    }

    /// Create an arena with the given initial capacity in bytes.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bump: ManuallyDrop::new(Bump::with_capacity(bytes)),
            ..Self::new()
        }
    }

    /// Cap the bytes this arena will carve; `None` is unlimited.
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// The configured limit.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Chunks carved since the last release.
    #[must_use]
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Bytes the underlying bump allocator holds, including slack.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    fn out_of_memory(&self, requested: usize) -> PoolError {
        PoolError::OutOfMemory {
            requested,
            reserved: self.reserved,
            limit: self.limit.unwrap_or(usize::MAX),
        }
    }
}

impl Default for PageArena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PageArena {
    fn drop(&mut self) {
        if self.chunks == 0 {
            // SAFETY: nothing was carved since the last release, and `bump`
            // is not used again.
            unsafe { ManuallyDrop::drop(&mut self.bump) };
        } else {
            warn!(
                chunks = self.chunks,
                reserved = self.reserved,
                "page arena dropped with carved chunks, leaking its pages"
            );
        }
    }
}

// SAFETY: carved chunks come from `bump`, which is reset only in
// `release_all` and freed on drop only when nothing is carved.
unsafe impl BlockSource for PageArena {
    fn acquire_blocks(
        &mut self,
        block_size: usize,
        count: usize,
    ) -> Result<CarvedBlocks, PoolError> {
        FreeStore::validate_block_size(block_size)?;
        if count == 0 {
            return Ok(CarvedBlocks::empty());
        }

        let bytes = block_size
            .checked_mul(count)
            .ok_or_else(|| self.out_of_memory(usize::MAX))?;
        if let Some(limit) = self.limit {
            if self.reserved.saturating_add(bytes) > limit {
                warn!(bytes, reserved = self.reserved, limit, "page arena limit reached");
                return Err(self.out_of_memory(bytes));
            }
        }

        let layout =
            Layout::from_size_align(bytes, CHUNK_ALIGN).map_err(|_| self.out_of_memory(bytes))?;
        let base = self
            .bump
            .try_alloc_layout(layout)
            .map_err(|_| self.out_of_memory(bytes))?;
        self.reserved += bytes;
        self.chunks += 1;
        debug!(block_size, count, bytes, reserved = self.reserved, "carved chunk");

        // SAFETY: bumpalo returned `bytes` fresh bytes aligned to CHUNK_ALIGN
        // (a multiple of the link alignment); `block_size` was validated as a
        // multiple of the link alignment; the arena never hands these bytes
        // out again and keeps them mapped until `release_all`.
        Ok(unsafe { CarvedBlocks::new(base, block_size, count) })
    }

    fn reserved_bytes(&self) -> usize {
        self.reserved
    }

    unsafe fn release_all(&mut self) {
        info!(chunks = self.chunks, reserved = self.reserved, "releasing page arena");
        self.bump.reset();
        self.reserved = 0;
        self.chunks = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use segpool_core::{PoolConfig, PoolContext, ReusePolicy, LINK_ALIGN};

    use super::*;

    #[test]
    fn default_arena_is_empty() {
        let arena = PageArena::default();
        assert_eq!(arena.reserved_bytes(), 0);
        assert_eq!(arena.chunks(), 0);
        assert_eq!(arena.limit(), None);
    }

    #[test]
    fn carves_distinct_aligned_blocks() {
        let mut arena = PageArena::with_capacity(64 * 1024);
        let blocks: Vec<_> = arena.acquire_blocks(48, 100).unwrap().collect();
        assert_eq!(blocks.len(), 100);

        let addrs: HashSet<usize> = blocks.iter().map(|b| b.as_ptr() as usize).collect();
        assert_eq!(addrs.len(), 100);
        assert!(addrs.iter().all(|a| a % LINK_ALIGN == 0));

        let lowest = *addrs.iter().min().unwrap();
        let highest = *addrs.iter().max().unwrap();
        assert_eq!(highest - lowest, 99 * 48);

        assert_eq!(arena.reserved_bytes(), 4800);
        assert_eq!(arena.chunks(), 1);
        assert!(arena.allocated_bytes() >= 4800);
    }

    #[test]
    fn zero_count_is_empty() {
        let mut arena = PageArena::new();
        assert_eq!(arena.acquire_blocks(32, 0).unwrap().count(), 0);
        assert_eq!(arena.chunks(), 0);
    }

    #[test]
    fn rejects_invalid_block_size() {
        let mut arena = PageArena::new();
        assert!(matches!(
            arena.acquire_blocks(12, 4),
            Err(PoolError::InvalidBlockSize { size: 12, .. })
        ));
    }

    #[test]
    fn limit_is_enforced() {
        let mut arena = PageArena::new().with_limit(Some(1024));
        assert!(arena.acquire_blocks(64, 16).is_ok());
        let err = arena.acquire_blocks(16, 1).unwrap_err();
        assert_eq!(
            err,
            PoolError::OutOfMemory {
                requested: 16,
                reserved: 1024,
                limit: 1024,
            }
        );
    }

    #[test]
    fn release_all_resets_accounting() {
        let mut arena = PageArena::new().with_limit(Some(512));
        drop(arena.acquire_blocks(32, 16).unwrap());
        assert!(arena.acquire_blocks(32, 1).is_err());

        unsafe { arena.release_all() };
        assert_eq!(arena.reserved_bytes(), 0);
        assert_eq!(arena.chunks(), 0);
        assert!(arena.acquire_blocks(32, 16).is_ok());
    }

    #[test]
    fn feeds_a_free_store() {
        let mut arena = PageArena::new();
        let mut store = FreeStore::new(64, ReusePolicy::LIFO).unwrap();
        assert_eq!(store.refill(arena.acquire_blocks(64, 32).unwrap()), 32);

        let block = store.take_block().unwrap();
        // the block is ours now: scribble over the former link words
        unsafe { block.as_ptr().write_bytes(0xAB, 64) };
        store.return_block(block);
        assert_eq!(store.count(), 32);
        assert!(store.is_consistent());
    }

    #[test]
    fn context_reports_out_of_memory() {
        let config = PoolConfig {
            size_classes: vec![64],
            central_batch: 4,
            ..PoolConfig::default()
        }
        .normalize();
        let arena = PageArena::new().with_limit(Some(4 * 64));
        let ctx = PoolContext::new(config, arena).unwrap();

        let held: Vec<_> = (0..4).map(|_| ctx.allocate(64).unwrap()).collect();
        assert!(matches!(
            ctx.allocate(64),
            Err(PoolError::OutOfMemory { .. })
        ));
        for block in held {
            ctx.deallocate(64, block).unwrap();
        }

        let (report, mut arena) = ctx.shutdown();
        assert_eq!(report.outstanding(), 0);
        assert_eq!(arena.reserved_bytes(), 4 * 64);

        unsafe { arena.release_all() };
        assert_eq!(arena.reserved_bytes(), 0);
    }

    #[test]
    fn shutdown_keeps_pages_for_blocks_still_held() {
        let config = PoolConfig {
            size_classes: vec![32],
            central_batch: 8,
            ..PoolConfig::default()
        }
        .normalize();
        let ctx = PoolContext::new(config, PageArena::new()).unwrap();
        let block = ctx.allocate(32).unwrap();

        let (_, arena) = ctx.shutdown();
        assert_eq!(arena.chunks(), 1);

        unsafe { block.as_ptr().write_bytes(0x5A, 32) };
        let mut store = FreeStore::new(32, ReusePolicy::LIFO).unwrap();
        store.return_block(block);
        assert!(store.is_consistent());

        // dropping the arena leaks the chunk the store still points into
        drop(arena);
        assert_eq!(store.count(), 1);
    }
}
