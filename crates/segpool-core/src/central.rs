//! Shared free store guarded by a mutex.
//!
//! Each operation takes the lock exactly once, so a refill or a batch move
//! is never partially visible to a concurrent take.

use parking_lot::Mutex;

use crate::block::Block;
use crate::error::PoolError;
use crate::policy::ReusePolicy;
use crate::stats::StoreStats;
use crate::store::FreeStore;

/// Central free store for one size class, shared by every thread cache.
#[derive(Debug)]
pub struct CentralStore {
    inner: Mutex<FreeStore>,
    block_size: usize,
}

impl CentralStore {
    /// Create an empty central store.
    pub fn new(block_size: usize, policy: ReusePolicy) -> Result<Self, PoolError> {
        Ok(Self {
            inner: Mutex::new(FreeStore::new(block_size, policy)?),
            block_size,
        })
    }

    /// Size of every block in this store.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Take one block.
    pub fn take_block(&self) -> Result<Block, PoolError> {
        self.inner.lock().take_block()
    }

    /// Return one block.
    pub fn return_block(&self, block: Block) {
        self.inner.lock().return_block(block);
    }

    /// Absorb a batch of fresh blocks under a single lock acquisition.
    pub fn refill<I>(&self, blocks: I) -> usize
    where
        I: IntoIterator<Item = Block>,
    {
        self.inner.lock().refill(blocks)
    }

    /// Absorb `blocks` and take one back out, atomically.
    pub fn refill_and_take<I>(&self, blocks: I) -> Result<Block, PoolError>
    where
        I: IntoIterator<Item = Block>,
    {
        let mut store = self.inner.lock();
        store.refill(blocks);
        store.take_block()
    }

    /// Move up to `max` blocks into `local`, taken from this store's take end.
    pub fn fill(&self, local: &mut FreeStore, max: usize) -> usize {
        let mut store = self.inner.lock();
        let from = store.policy().take;
        store.transfer_to(local, max, from)
    }

    /// Move up to `max` of `local`'s least recently freed blocks back here.
    ///
    /// Blocks are returned at the policy's give end, so the opposite end
    /// holds the ones freed longest ago under both LIFO and FIFO.
    pub fn flush(&self, local: &mut FreeStore, max: usize) -> usize {
        let cold = local.policy().give.opposite();
        local.transfer_to(&mut self.inner.lock(), max, cold)
    }

    /// Move everything from `local` back here.
    pub fn absorb(&self, local: &mut FreeStore) -> usize {
        local.drain_into(&mut self.inner.lock())
    }

    /// Number of free blocks.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.lock().count()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.inner.lock().stats()
    }

    /// Run `f` against the locked store; used for diagnostics such as
    /// walking the free addresses.
    pub fn with_store<R>(&self, f: impl FnOnce(&FreeStore) -> R) -> R {
        f(&self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use std::ptr::NonNull;
    use std::sync::Arc;

    use super::*;
    use crate::source::CarvedBlocks;

    fn carve(words: &mut [usize], block_size: usize) -> CarvedBlocks {
        let count = std::mem::size_of_val(words) / block_size;
        let base = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
        unsafe { CarvedBlocks::new(base, block_size, count) }
    }

    #[test]
    fn refill_and_take() {
        let mut words = vec![0usize; 32];
        let central = CentralStore::new(32, ReusePolicy::LIFO).unwrap();
        assert_eq!(central.refill(carve(&mut words, 32)), 8);
        assert_eq!(central.count(), 8);

        let block = central.take_block().unwrap();
        assert_eq!(central.count(), 7);
        central.return_block(block);
        assert_eq!(central.count(), 8);
    }

    #[test]
    fn refill_and_take_is_atomic_unit() {
        let mut words = vec![0usize; 8];
        let central = CentralStore::new(32, ReusePolicy::LIFO).unwrap();
        let block = central.refill_and_take(carve(&mut words, 32)).unwrap();
        assert_eq!(central.count(), 1);
        assert!(!central.with_store(|s| s.contains(block.addr())));
    }

    #[test]
    fn fill_and_flush_move_batches() {
        let mut words = vec![0usize; 64];
        let central = CentralStore::new(32, ReusePolicy::LIFO).unwrap();
        central.refill(carve(&mut words, 32));

        let mut local = FreeStore::new(32, ReusePolicy::LIFO).unwrap();
        assert_eq!(central.fill(&mut local, 10), 10);
        assert_eq!(central.count(), 6);
        assert_eq!(local.count(), 10);

        assert_eq!(central.flush(&mut local, 4), 4);
        assert_eq!(local.count(), 6);
        assert_eq!(central.count(), 10);

        assert_eq!(central.absorb(&mut local), 6);
        assert_eq!(central.count(), 16);
        assert!(central.with_store(FreeStore::is_consistent));
    }

    #[test]
    fn flush_sends_cold_end() {
        let mut words = vec![0usize; 12];
        let central = CentralStore::new(32, ReusePolicy::LIFO).unwrap();
        let mut local = FreeStore::new(32, ReusePolicy::LIFO).unwrap();
        local.refill(carve(&mut words, 32));
        let oldest = local.iter().next().unwrap();

        central.flush(&mut local, 1);
        assert!(central.with_store(|s| s.contains(oldest)));
    }

    #[test]
    fn fifo_flush_sends_least_recently_freed() {
        let mut words = vec![0usize; 3 * 32 / std::mem::size_of::<usize>()];
        let blocks: Vec<Block> = carve(&mut words, 32).collect();
        let oldest = blocks[0].addr();
        let newest = blocks[2].addr();

        let central = CentralStore::new(32, ReusePolicy::FIFO).unwrap();
        let mut local = FreeStore::new(32, ReusePolicy::FIFO).unwrap();
        for block in blocks {
            local.return_block(block);
        }

        assert_eq!(central.flush(&mut local, 1), 1);
        assert!(central.with_store(|s| s.contains(oldest)));
        assert!(local.contains(newest));
    }

    #[test]
    fn concurrent_take_and_return_conserve_blocks() {
        let mut words = vec![0usize; 4 * 256];
        let central = Arc::new(CentralStore::new(32, ReusePolicy::LIFO).unwrap());
        central.refill(carve(&mut words, 32));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let central = Arc::clone(&central);
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        if let Ok(block) = central.take_block() {
                            central.return_block(block);
                        }
                    }
                });
            }
        });

        assert_eq!(central.count(), 256);
        assert!(central.with_store(FreeStore::is_consistent));
    }
}
