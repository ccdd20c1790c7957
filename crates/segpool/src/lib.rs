//! segpool library — application logic for the pool stress driver.

pub mod app;
pub mod config;
pub mod errors;
pub mod version;
