//! The page-supplier seam: where fresh blocks come from.

use std::iter::FusedIterator;
use std::ptr::NonNull;

use crate::block::{Block, LINK_ALIGN};
use crate::error::PoolError;

/// Supplies raw blocks carved from memory the source owns.
///
/// Implemented by page collaborators such as `segpool_memory::PageArena`.
///
/// # Safety
///
/// `Block` tokens are plain values that safe code can move between stores
/// and contexts, so nothing tracks which source a live block came from.
/// Implementors must therefore keep every carved chunk valid until
/// [`BlockSource::release_all`] is called. In particular, dropping the
/// source must not free carved memory; a source dropped while it still has
/// carved chunks leaks them.
pub unsafe trait BlockSource: Send {
    /// Carve `count` contiguous blocks of `block_size` bytes.
    ///
    /// Fails with [`PoolError::OutOfMemory`] when the source cannot grow.
    fn acquire_blocks(&mut self, block_size: usize, count: usize)
        -> Result<CarvedBlocks, PoolError>;

    /// Bytes handed out so far.
    fn reserved_bytes(&self) -> usize;

    /// Give every page back.
    ///
    /// # Safety
    ///
    /// No block carved from this source may still be alive, whether held by
    /// a caller or linked into any store.
    unsafe fn release_all(&mut self);
}

/// Allocation-free iterator slicing one contiguous chunk into blocks.
#[derive(Debug)]
pub struct CarvedBlocks {
    next: *mut u8,
    stride: usize,
    remaining: usize,
}

// SAFETY: the iterator is the sole owner of the not-yet-yielded spans.
unsafe impl Send for CarvedBlocks {}

impl CarvedBlocks {
    /// Slice `count` blocks of `stride` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// - `base` is aligned to [`LINK_ALIGN`] and valid for reads and writes
    ///   of `stride * count` bytes, and `stride` is a multiple of
    ///   [`LINK_ALIGN`].
    /// - The chunk stays valid for as long as any yielded [`Block`] lives.
    /// - Nothing else refers to the chunk.
    #[must_use]
    pub unsafe fn new(base: NonNull<u8>, stride: usize, count: usize) -> Self {
        debug_assert_eq!(base.as_ptr() as usize % LINK_ALIGN, 0);
        debug_assert_eq!(stride % LINK_ALIGN, 0);
        Self {
            next: base.as_ptr(),
            stride,
            remaining: count,
        }
    }

    /// An iterator that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            next: NonNull::dangling().as_ptr(),
            stride: 0,
            remaining: 0,
        }
    }
}

impl Iterator for CarvedBlocks {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.remaining == 0 {
            return None;
        }
        let addr = NonNull::new(self.next)?;
        self.remaining -= 1;
        self.next = self.next.wrapping_add(self.stride);
        // SAFETY: `addr` lies inside the chunk promised to `new`, and each
        // offset is yielded exactly once.
        Some(unsafe { Block::from_raw(addr) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for CarvedBlocks {}

impl FusedIterator for CarvedBlocks {}
