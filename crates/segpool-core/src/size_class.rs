//! Size-class table: which free store serves a request.

use crate::constants::DEFAULT_SIZE_CLASSES;
use crate::error::PoolError;
use crate::store::FreeStore;

/// Ordered table of block sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeClasses {
    sizes: Vec<usize>,
}

impl SizeClasses {
    /// Build a table from block sizes in any order. Duplicates are dropped.
    pub fn new(sizes: &[usize]) -> Result<Self, PoolError> {
        if sizes.is_empty() {
            return Err(PoolError::Config("at least one size class is required".into()));
        }
        let mut sizes = sizes.to_vec();
        sizes.sort_unstable();
        sizes.dedup();
        for &size in &sizes {
            FreeStore::validate_block_size(size)?;
        }
        Ok(Self { sizes })
    }

    /// Index of the smallest class that fits `size` bytes.
    pub fn class_for(&self, size: usize) -> Result<usize, PoolError> {
        let index = self.sizes.partition_point(|&class| class < size);
        if index == self.sizes.len() {
            return Err(PoolError::UnknownSizeClass { size });
        }
        Ok(index)
    }

    /// Block size of class `index`.
    #[must_use]
    pub fn block_size(&self, index: usize) -> Option<usize> {
        self.sizes.get(index).copied()
    }

    /// Largest size this table serves.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.sizes.last().copied().unwrap_or(0)
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Always false for a constructed table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Block sizes in ascending order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.sizes.iter().copied()
    }
}

impl Default for SizeClasses {
    fn default() -> Self {
        Self {
            sizes: DEFAULT_SIZE_CLASSES.to_vec(),
        }
    }
}
