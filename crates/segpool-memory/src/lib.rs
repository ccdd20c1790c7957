//! # segpool-memory
//!
//! Page supply for segpool: a bump arena that carves fresh chunks into
//! fixed-size blocks for the free stores, and memory-budget parsing.
#![warn(missing_docs)]
// Chunks from the bump arena are handed to the stores as raw blocks.
#![allow(unsafe_code)]

pub mod arena;
pub mod budget;

pub use arena::PageArena;
pub use budget::parse_memory_limit;
