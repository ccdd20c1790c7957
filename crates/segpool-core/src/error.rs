//! Error type shared by stores, caches, and page sources.

/// Recoverable pool conditions.
///
/// Contract violations (double return, removing a detached node) are not
/// represented here; they are debug assertions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The store has no free block; the caller should refill and retry.
    #[error("free store for {block_size}-byte blocks is exhausted")]
    Exhausted {
        /// Block size of the exhausted store.
        block_size: usize,
    },

    /// The page source could not supply more memory.
    #[error("out of memory: requested {requested} bytes with {reserved} of {limit} bytes reserved")]
    OutOfMemory {
        /// Bytes requested from the source.
        requested: usize,
        /// Bytes the source had already handed out.
        reserved: usize,
        /// Configured limit (`usize::MAX` when unlimited).
        limit: usize,
    },

    /// A block size that cannot hold a free-list link.
    #[error("invalid block size {size}: {reason}")]
    InvalidBlockSize {
        /// Offending size in bytes.
        size: usize,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// No size class is large enough for the request.
    #[error("no size class fits a {size}-byte request")]
    UnknownSizeClass {
        /// Requested size in bytes.
        size: usize,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_size() {
        let err = PoolError::Exhausted { block_size: 64 };
        assert_eq!(err.to_string(), "free store for 64-byte blocks is exhausted");

        let err = PoolError::UnknownSizeClass { size: 9000 };
        assert!(err.to_string().contains("9000"));
    }
}
