//! Raw block handles and the free-block overlay.

use std::mem::{align_of, size_of};
use std::ptr::NonNull;

use crate::list::{Link, Linked};

/// Bytes a block needs to hold its free-list link.
pub const LINK_SIZE: usize = size_of::<Link>();

/// Alignment every block address must satisfy.
pub const LINK_ALIGN: usize = align_of::<Link>();

/// Ownership token for one fixed-size span of raw memory.
///
/// A `Block` is neither `Clone` nor `Copy`: whoever holds it owns the span,
/// and handing it to a store gives the span up. The pool only ever reasons
/// about the address; it never reads the contents of an allocated block.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Block {
    addr: NonNull<u8>,
}

// SAFETY: a block is an exclusive claim on a span of plain memory; moving
// that claim to another thread is sound.
unsafe impl Send for Block {}

impl Block {
    /// Claim the span starting at `addr`.
    ///
    /// # Safety
    ///
    /// - `addr` is aligned to [`LINK_ALIGN`] and valid for reads and writes
    ///   of at least the block size of any store it will be returned to.
    /// - The span outlives the `Block` (it is not released back to its page
    ///   source while any block carved from it is alive).
    /// - No other `Block` or store refers to the same span.
    #[must_use]
    pub unsafe fn from_raw(addr: NonNull<u8>) -> Self {
        Self { addr }
    }

    /// Address of the span.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> NonNull<u8> {
        self.addr
    }

    /// Raw pointer to the first byte of the span.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr()
    }

    /// Give up the token and keep only the address.
    #[inline]
    #[must_use]
    pub fn into_raw(self) -> NonNull<u8> {
        self.addr
    }
}

/// What a free block looks like to its list.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct FreeBlock {
    link: Link,
}

// SAFETY: `#[repr(C)]` with the link as the only field.
unsafe impl Linked for FreeBlock {}

impl FreeBlock {
    /// Write a detached link over the first two words of `block`.
    #[inline]
    pub(crate) fn overlay(block: Block) -> NonNull<FreeBlock> {
        debug_assert_eq!(
            block.as_ptr() as usize % LINK_ALIGN,
            0,
            "block {:p} is not aligned for a link",
            block.as_ptr()
        );
        let node = block.into_raw().cast::<FreeBlock>();
        // SAFETY: `Block` guarantees an aligned, writable span at least one
        // link wide that nothing else refers to.
        unsafe {
            node.as_ptr().write(FreeBlock {
                link: Link::detached(),
            });
        }
        node
    }

    /// Turn an unlinked node back into an ownership token.
    ///
    /// # Safety
    ///
    /// `node` came from [`FreeBlock::overlay`] and has just been unlinked, so
    /// no list refers to it any more.
    #[inline]
    pub(crate) unsafe fn into_block(node: NonNull<FreeBlock>) -> Block {
        // SAFETY: the span was a `Block` before `overlay` and is exclusive again.
        unsafe { Block::from_raw(node.cast()) }
    }
}
