//! Pool configuration.

use serde::Serialize;

use crate::constants::{
    DEFAULT_CACHE_BATCH, DEFAULT_CENTRAL_BATCH, DEFAULT_HIGH_WATERMARK, DEFAULT_SIZE_CLASSES,
};
use crate::error::PoolError;
use crate::policy::ReusePolicy;
use crate::size_class::SizeClasses;

/// Tuning knobs for a [`PoolContext`](crate::context::PoolContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolConfig {
    /// Block sizes, one free store each.
    pub size_classes: Vec<usize>,
    /// Blocks carved per request to the page source.
    pub central_batch: usize,
    /// Blocks moved between a thread cache and the central store at once.
    pub cache_batch: usize,
    /// Thread-cache occupancy that triggers a flush.
    pub high_watermark: usize,
    /// Reuse policy for every store.
    pub policy: ReusePolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size_classes: DEFAULT_SIZE_CLASSES.to_vec(),
            central_batch: DEFAULT_CENTRAL_BATCH,
            cache_batch: DEFAULT_CACHE_BATCH,
            high_watermark: DEFAULT_HIGH_WATERMARK,
            policy: ReusePolicy::LIFO,
        }
    }
}

impl PoolConfig {
    /// Sort and dedup the size classes and raise the high watermark to at
    /// least twice the cache batch, so a flush never leaves a cache that
    /// refills on the very next take.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        self.size_classes.sort_unstable();
        self.size_classes.dedup();
        self.high_watermark = self.high_watermark.max(self.cache_batch.saturating_mul(2));
        self
    }

    /// Reject configurations the stores cannot run with.
    pub fn validate(&self) -> Result<(), PoolError> {
        SizeClasses::new(&self.size_classes)?;
        if self.central_batch == 0 {
            return Err(PoolError::Config("central batch must be at least 1".into()));
        }
        if self.cache_batch == 0 {
            return Err(PoolError::Config("cache batch must be at least 1".into()));
        }
        if self.high_watermark < self.cache_batch {
            return Err(PoolError::Config(format!(
                "high watermark {} is below the cache batch {}",
                self.high_watermark, self.cache_batch
            )));
        }
        Ok(())
    }
}
