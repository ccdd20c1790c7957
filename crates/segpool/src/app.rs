//! Application entry point: the multi-threaded pool workload.
//!
//! Every worker owns a set of thread caches over one shared
//! [`PoolContext`] and randomly allocates or frees blocks of random sizes.
//! When all workers have finished and handed their blocks back, every block
//! ever carved must be back in a central store.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{debug, info};

use segpool_core::{Block, BlockSource, PoolContext, PoolError, PoolReport, PoolStats};
use segpool_memory::PageArena;

use crate::config::AppConfig;
use crate::errors::ConservationError;
use crate::version::full_version;

/// Totals of one worker thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerOutcome {
    /// Blocks obtained.
    pub allocations: u64,
    /// Blocks handed back.
    pub frees: u64,
    /// Allocations refused by the page arena.
    pub out_of_memory: u64,
    /// Most blocks held at once.
    pub peak_live: usize,
    /// Thread-cache counters.
    pub stats: PoolStats,
}

impl WorkerOutcome {
    fn merge(&mut self, other: &WorkerOutcome) {
        self.allocations += other.allocations;
        self.frees += other.frees;
        self.out_of_memory += other.out_of_memory;
        self.peak_live = self.peak_live.max(other.peak_live);
        self.stats.merge(&other.stats);
    }
}

/// Everything a run reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Tool version.
    pub version: String,
    /// Worker threads.
    pub threads: usize,
    /// Steps per worker.
    pub cycles: usize,
    /// Reuse policy name.
    pub policy: String,
    /// Wall-clock time of the workload.
    pub elapsed_ms: u128,
    /// Merged worker totals.
    pub totals: WorkerOutcome,
    /// Bytes the page arena held, including bump slack.
    pub arena_bytes: usize,
    /// Pool occupancy at shutdown.
    pub pool: PoolReport,
}

/// Small xorshift generator; deterministic per seed, good enough to shuffle
/// a workload.
#[derive(Debug, Clone)]
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        // xorshift never leaves zero
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    #[allow(clippy::cast_possible_truncation)]
    fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

/// Run the application.
pub fn run(config: &AppConfig) -> Result<()> {
    let summary = run_workload(config)?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        present(&summary);
    }

    let outstanding = summary.pool.outstanding();
    if outstanding != 0 {
        return Err(ConservationError { outstanding }.into());
    }
    Ok(())
}

/// Build a pool from `config`, drive it from every worker, and shut it down.
#[allow(unsafe_code)]
pub fn run_workload(config: &AppConfig) -> Result<RunSummary> {
    if config.threads == 0 {
        return Err(PoolError::Config("at least one worker thread is required".into()).into());
    }
    if config.max_live == 0 {
        return Err(PoolError::Config("max-live must be at least 1".into()).into());
    }

    let pool_config = config.pool_config()?;
    let arena = PageArena::new().with_limit(config.memory_limit()?);
    let ctx = PoolContext::new(pool_config, arena)?;

    let started = Instant::now();
    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|worker| {
                let ctx = &ctx;
                scope.spawn(move || run_worker(ctx, worker, config))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow!("worker thread panicked"))?
                    .map_err(anyhow::Error::from)
            })
            .collect::<Result<Vec<_>>>()
    })?;
    let elapsed = started.elapsed();

    let mut totals = WorkerOutcome::default();
    for outcome in &outcomes {
        totals.merge(outcome);
    }

    let policy = ctx.config().policy.to_string();
    let (pool, mut arena) = ctx.shutdown();
    let arena_bytes = arena.allocated_bytes();
    // SAFETY: every worker has joined, and blocks never leave `run_worker`,
    // so no block carved from the arena is alive any more.
    unsafe { arena.release_all() };
    info!(
        threads = config.threads,
        allocations = totals.allocations,
        elapsed_ms = elapsed.as_millis(),
        "workload finished"
    );

    Ok(RunSummary {
        version: full_version(),
        threads: config.threads,
        cycles: config.cycles,
        policy,
        elapsed_ms: elapsed.as_millis(),
        totals,
        arena_bytes,
        pool,
    })
}

fn run_worker(
    ctx: &PoolContext<PageArena>,
    worker: usize,
    config: &AppConfig,
) -> Result<WorkerOutcome, PoolError> {
    let mut caches = ctx.local_caches()?;
    let mut rng = XorShift::new(config.seed ^ (worker as u64).rotate_left(32));
    let max_size = ctx.size_classes().max_size();
    let mut live: Vec<(usize, Block)> = Vec::with_capacity(config.max_live);
    let mut outcome = WorkerOutcome::default();

    for _ in 0..config.cycles {
        let free = !live.is_empty() && (live.len() >= config.max_live || rng.next_u64() & 1 == 0);
        if free {
            let (size, block) = live.swap_remove(rng.below(live.len()));
            caches.deallocate(size, block)?;
            outcome.frees += 1;
            continue;
        }

        let size = rng.below(max_size) + 1;
        match caches.allocate(size) {
            Ok(block) => {
                live.push((size, block));
                outcome.allocations += 1;
                outcome.peak_live = outcome.peak_live.max(live.len());
            }
            Err(PoolError::OutOfMemory { .. }) if !live.is_empty() => {
                // make room and carry on
                outcome.out_of_memory += 1;
                let (size, block) = live.swap_remove(rng.below(live.len()));
                caches.deallocate(size, block)?;
                outcome.frees += 1;
            }
            Err(err) => return Err(err),
        }
    }

    for (size, block) in live.drain(..) {
        caches.deallocate(size, block)?;
        outcome.frees += 1;
    }
    outcome.stats = caches.stats();
    debug!(worker, allocations = outcome.allocations, "worker finished");
    Ok(outcome)
}

#[allow(clippy::cast_precision_loss)]
fn present(summary: &RunSummary) {
    let elapsed = Duration::from_millis(u64::try_from(summary.elapsed_ms).unwrap_or(u64::MAX));
    let totals = &summary.totals;
    let ops = totals.allocations + totals.frees;
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = if secs > 0.0 { ops as f64 / secs } else { 0.0 };

    println!(
        "{}: {} threads x {} cycles, policy {}",
        summary.version, summary.threads, summary.cycles, summary.policy
    );
    println!("  elapsed:        {elapsed:.3?}");
    println!("  operations:     {ops} ({ops_per_sec:.0} ops/s)");
    println!(
        "  allocations:    {} (peak live per worker {})",
        totals.allocations, totals.peak_live
    );
    println!("  frees:          {}", totals.frees);
    if totals.out_of_memory > 0 {
        println!("  out of memory:  {}", totals.out_of_memory);
    }
    println!(
        "  cache hit rate: {:.1}% ({} refills, {} flushes)",
        totals.stats.hit_rate() * 100.0,
        totals.stats.refills,
        totals.stats.flushes
    );
    println!(
        "  arena bytes:    {} carved, {} mapped",
        summary.pool.reserved_bytes, summary.arena_bytes
    );
    println!();
    println!("  {:>10} {:>10} {:>10} {:>12}", "block", "carved", "free", "outstanding");
    for class in summary.pool.classes.iter().filter(|c| c.carved > 0) {
        println!(
            "  {:>10} {:>10} {:>10} {:>12}",
            class.block_size, class.carved, class.central_free, class.outstanding
        );
    }
    println!();
    println!(
        "conservation: {} of {} blocks returned",
        summary.pool.free(),
        summary.pool.carved()
    );
}
