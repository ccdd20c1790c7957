//! Multi-threaded conservation tests over a bump-arena-backed pool.
//!
//! However the workers interleave, every block carved from the arena must
//! end up back in a central store once the workers are done, and no block
//! may be held by two workers at the same time.

#![allow(unsafe_code)]

use std::collections::HashSet;
use std::sync::Barrier;

use segpool_core::{Block, BlockSource, PoolConfig, PoolContext, ReusePolicy};
use segpool_memory::PageArena;

const THREADS: usize = 8;
const CYCLES: usize = 2_000;

fn small_config(policy: ReusePolicy) -> PoolConfig {
    PoolConfig {
        size_classes: vec![16, 64, 256],
        central_batch: 32,
        cache_batch: 8,
        high_watermark: 16,
        policy,
    }
    .normalize()
}

/// Stamp the first word of `block` with `tag`.
fn stamp(block: &Block, tag: usize) {
    unsafe { block.as_ptr().cast::<usize>().write(tag) };
}

fn stamp_of(block: &Block) -> usize {
    unsafe { block.as_ptr().cast::<usize>().read() }
}

fn hammer(policy: ReusePolicy) {
    let ctx = PoolContext::new(small_config(policy), PageArena::new()).unwrap();
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|scope| {
        for worker in 0..THREADS {
            let ctx = &ctx;
            let barrier = &barrier;
            scope.spawn(move || {
                let mut caches = ctx.local_caches().unwrap();
                barrier.wait();
                for cycle in 0..CYCLES {
                    let class = (worker + cycle) % 3;
                    let held: Vec<Block> = (0..=(cycle % 24))
                        .map(|i| {
                            let block = caches.take_block(class).unwrap();
                            stamp(&block, worker * 1_000 + i);
                            block
                        })
                        .collect();
                    for (i, block) in held.into_iter().enumerate() {
                        assert_eq!(
                            stamp_of(&block),
                            worker * 1_000 + i,
                            "block shared between owners"
                        );
                        caches.return_block(class, block);
                    }
                }
            });
        }
    });

    let report = ctx.report();
    assert!(report.carved() > 0);
    assert_eq!(report.outstanding(), 0);
    assert_eq!(report.free(), report.carved());
    for class in 0..3 {
        let central = ctx.central(class).unwrap();
        assert!(central.with_store(|store| store.is_consistent()));
        let distinct: HashSet<_> = central.with_store(|store| store.iter().collect());
        assert_eq!(distinct.len(), central.count());
    }

    let (report, mut arena) = ctx.shutdown();
    assert_eq!(report.outstanding(), 0);
    assert!(arena.chunks() > 0, "shutdown leaves the pages mapped");

    // every worker has joined and no block left its scope
    unsafe { arena.release_all() };
    assert_eq!(arena.chunks(), 0);
}

#[test]
fn lifo_workers_conserve_blocks() {
    hammer(ReusePolicy::LIFO);
}

#[test]
fn fifo_workers_conserve_blocks() {
    hammer(ReusePolicy::FIFO);
}

#[test]
fn central_only_traffic_conserves_blocks() {
    let ctx = PoolContext::new(small_config(ReusePolicy::LIFO), PageArena::new()).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let ctx = &ctx;
            scope.spawn(move || {
                for cycle in 0..CYCLES {
                    let size = 1 + cycle % 256;
                    let block = ctx.allocate(size).unwrap();
                    ctx.deallocate(size, block).unwrap();
                }
            });
        }
    });

    assert_eq!(ctx.report().outstanding(), 0);
}

#[test]
fn held_blocks_keep_the_arena_alive() {
    let ctx = PoolContext::new(small_config(ReusePolicy::LIFO), PageArena::new()).unwrap();
    let block = ctx.allocate(64).unwrap();

    let (report, mut arena) = ctx.shutdown();
    assert_eq!(report.outstanding(), 1);
    assert_eq!(arena.chunks(), 1, "pages stay mapped while a block is out");

    // the token is still usable until the arena goes
    stamp(&block, 7);
    assert_eq!(stamp_of(&block), 7);
    drop(block);
    unsafe { arena.release_all() };
}
