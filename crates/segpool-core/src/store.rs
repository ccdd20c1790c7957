//! Free store for one size class.
//!
//! A [`FreeStore`] threads the free blocks of a single block size onto a
//! [`PoolList`]. `take_block` and `return_block` are the only way callers
//! touch free memory; both are O(1) and never allocate, merge, or inspect
//! neighbouring blocks.

use std::ptr::NonNull;

use crate::block::{Block, FreeBlock, LINK_ALIGN, LINK_SIZE};
use crate::error::PoolError;
use crate::list::PoolList;
use crate::policy::{End, ReusePolicy};
use crate::stats::StoreStats;

/// Longest free list debug builds walk to catch a block returned twice.
/// Longer lists skip the check so debug runs stay linear.
const DOUBLE_RETURN_SCAN_LIMIT: usize = 1024;

/// Free blocks of one fixed size.
#[derive(Debug)]
pub struct FreeStore {
    list: PoolList<FreeBlock>,
    block_size: usize,
    policy: ReusePolicy,
    stats: StoreStats,
}

// SAFETY: the store exclusively owns every block linked into it, and the
// list is only reachable through the store.
unsafe impl Send for FreeStore {}

impl FreeStore {
    /// Create an empty store for `block_size`-byte blocks.
    pub fn new(block_size: usize, policy: ReusePolicy) -> Result<Self, PoolError> {
        Self::validate_block_size(block_size)?;
        Ok(Self {
            list: PoolList::new(),
            block_size,
            policy,
            stats: StoreStats::default(),
        })
    }

    /// Check that blocks of `size` bytes can carry a link and keep every
    /// block of a contiguous run aligned.
    pub fn validate_block_size(size: usize) -> Result<(), PoolError> {
        if size < LINK_SIZE {
            return Err(PoolError::InvalidBlockSize {
                size,
                reason: "smaller than a free-list link",
            });
        }
        if size % LINK_ALIGN != 0 {
            return Err(PoolError::InvalidBlockSize {
                size,
                reason: "not a multiple of the pointer alignment",
            });
        }
        Ok(())
    }

    /// Hand out one free block, or [`PoolError::Exhausted`] when the store
    /// is empty. The caller refills and retries.
    #[inline]
    pub fn take_block(&mut self) -> Result<Block, PoolError> {
        match self.pop(self.policy.take) {
            Some(block) => {
                self.stats.takes += 1;
                Ok(block)
            }
            None => {
                self.stats.exhausted += 1;
                Err(PoolError::Exhausted {
                    block_size: self.block_size,
                })
            }
        }
    }

    /// Make `block` available to the next `take_block`.
    ///
    /// Debug builds assert that the block is not already in this store,
    /// as long as the store holds at most 1024 blocks.
    #[inline]
    pub fn return_block(&mut self, block: Block) {
        debug_assert!(
            self.count() > DOUBLE_RETURN_SCAN_LIMIT || !self.contains(block.addr()),
            "block {:p} returned twice to the {}-byte store",
            block.as_ptr(),
            self.block_size
        );
        self.push(block, self.policy.give);
        self.stats.returns += 1;
    }

    /// Absorb a batch of freshly carved blocks, pushing each at the back.
    /// Returns how many were added.
    pub fn refill<I>(&mut self, blocks: I) -> usize
    where
        I: IntoIterator<Item = Block>,
    {
        let mut added = 0usize;
        for block in blocks {
            self.push(block, End::Back);
            added += 1;
        }
        self.stats.refilled += added as u64;
        added
    }

    /// Move up to `max` blocks from the `from` end of this store to the back
    /// of `dst`. Returns how many moved.
    pub fn transfer_to(&mut self, dst: &mut FreeStore, max: usize, from: End) -> usize {
        debug_assert_eq!(
            self.block_size, dst.block_size,
            "blocks can only move between stores of the same size class"
        );
        let mut moved = 0usize;
        while moved < max {
            let Some(block) = self.pop(from) else {
                break;
            };
            dst.push(block, End::Back);
            moved += 1;
        }
        moved
    }

    /// Move every block to the back of `dst` in O(1). Returns how many moved.
    pub fn drain_into(&mut self, dst: &mut FreeStore) -> usize {
        debug_assert_eq!(
            self.block_size, dst.block_size,
            "blocks can only move between stores of the same size class"
        );
        let moved = self.list.len();
        dst.list.append(&mut self.list);
        moved
    }

    /// Number of free blocks.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.list.len()
    }

    /// True when no block is free.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Size of every block in this store.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The store's reuse policy.
    #[must_use]
    pub fn policy(&self) -> ReusePolicy {
        self.policy
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Addresses of the free blocks, in list order. Meant for leak and
    /// fragmentation tooling.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = NonNull<u8>> + '_ {
        self.list.iter().map(NonNull::cast)
    }

    /// O(n) check whether the block at `addr` is free in this store.
    #[must_use]
    pub fn contains(&self, addr: NonNull<u8>) -> bool {
        self.list.contains(addr.cast())
    }

    /// Verify the underlying ring (see [`PoolList::is_consistent`]).
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.list.is_consistent()
    }

    #[inline]
    fn pop(&mut self, end: End) -> Option<Block> {
        let node = match end {
            End::Back => self.list.pop(),
            End::Front => self.list.pop_front(),
        }?;
        // SAFETY: `node` was overlaid by `push` and has just been unlinked.
        Some(unsafe { FreeBlock::into_block(node) })
    }

    #[inline]
    fn push(&mut self, block: Block, end: End) {
        let node = FreeBlock::overlay(block);
        // SAFETY: `overlay` wrote a detached link into a span the `Block`
        // owned exclusively; that ownership now moves to the list.
        unsafe {
            match end {
                End::Back => self.list.push(node),
                End::Front => self.list.push_front(node),
            }
        }
    }
}
