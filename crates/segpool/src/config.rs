//! Application configuration from CLI flags and environment.

use clap::Parser;

use segpool_core::{
    PoolConfig, PoolError, ReusePolicy, DEFAULT_CACHE_BATCH, DEFAULT_CENTRAL_BATCH,
    DEFAULT_HIGH_WATERMARK, DEFAULT_SIZE_CLASSES,
};
use segpool_memory::parse_memory_limit;

/// segpool — stress and statistics driver for segregated free stores.
#[derive(Parser, Debug)]
#[command(name = "segpool", version, about)]
pub struct AppConfig {
    /// Worker threads.
    #[arg(short, long, default_value = "4", env = "SEGPOOL_THREADS")]
    pub threads: usize,

    /// Allocate-or-free steps per worker.
    #[arg(short, long, default_value = "100000", env = "SEGPOOL_CYCLES")]
    pub cycles: usize,

    /// Comma-separated block sizes in bytes (default: built-in table).
    #[arg(long, value_delimiter = ',')]
    pub classes: Vec<usize>,

    /// Blocks moved between a thread cache and the central store at once.
    #[arg(long, default_value_t = DEFAULT_CACHE_BATCH)]
    pub batch: usize,

    /// Blocks carved from the page arena per refill.
    #[arg(long, default_value_t = DEFAULT_CENTRAL_BATCH)]
    pub central_batch: usize,

    /// Thread-cache occupancy that triggers a flush.
    #[arg(long, default_value_t = DEFAULT_HIGH_WATERMARK)]
    pub high_watermark: usize,

    /// Reuse policy: lifo or fifo.
    #[arg(long, default_value = "lifo")]
    pub policy: ReusePolicy,

    /// Most blocks a worker holds at once.
    #[arg(long, default_value = "256")]
    pub max_live: usize,

    /// Memory limit for the page arena (e.g., "64M", "512K").
    #[arg(long, default_value = "")]
    pub memory_limit: String,

    /// Seed for the workload generator.
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Pool configuration for this run, normalized and validated.
    pub fn pool_config(&self) -> Result<PoolConfig, PoolError> {
        let size_classes = if self.classes.is_empty() {
            DEFAULT_SIZE_CLASSES.to_vec()
        } else {
            self.classes.clone()
        };
        let config = PoolConfig {
            size_classes,
            central_batch: self.central_batch,
            cache_batch: self.batch,
            high_watermark: self.high_watermark,
            policy: self.policy,
        }
        .normalize();
        config.validate()?;
        Ok(config)
    }

    /// Page-arena limit in bytes; `None` is unlimited.
    pub fn memory_limit(&self) -> Result<Option<usize>, PoolError> {
        parse_memory_limit(&self.memory_limit)
    }
}
