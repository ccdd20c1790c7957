//! # segpool-core
//!
//! Intrusive free-block pooling for segregated-size-class allocators.
//!
//! Free blocks are threaded onto a circular doubly-linked [`PoolList`]
//! through a two-word [`Link`] written into the block itself, so a free
//! block costs no metadata beyond its own first two words. A [`FreeStore`]
//! wraps one list per size class; [`CentralStore`] shares one across
//! threads behind a mutex and [`ThreadCache`] gives each thread a private,
//! lock-free fast path in front of it. [`PoolContext`] ties the stores of
//! every size class to a [`BlockSource`] that supplies fresh memory.
#![warn(missing_docs)]
// Intrusive links are raw pointers into memory the pool does not own.
#![allow(unsafe_code)]

pub mod block;
pub mod cache;
pub mod central;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod list;
pub mod policy;
pub mod size_class;
pub mod source;
pub mod stats;
pub mod store;

// Re-exports
pub use block::{Block, LINK_ALIGN, LINK_SIZE};
pub use cache::ThreadCache;
pub use central::CentralStore;
pub use config::PoolConfig;
pub use constants::{
    exit_codes, DEFAULT_CACHE_BATCH, DEFAULT_CENTRAL_BATCH, DEFAULT_HIGH_WATERMARK,
    DEFAULT_SIZE_CLASSES,
};
pub use context::{ClassReport, LocalCaches, PoolContext, PoolReport};
pub use error::PoolError;
pub use list::{Link, Linked, PoolList};
pub use policy::{End, ReusePolicy};
pub use size_class::SizeClasses;
pub use source::{BlockSource, CarvedBlocks};
pub use stats::{AtomicPoolStats, PoolStats, StoreStats};
pub use store::FreeStore;
