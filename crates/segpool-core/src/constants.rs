//! Defaults for size classes, batch sizes, and exit codes.

/// Default size-class table in bytes.
pub const DEFAULT_SIZE_CLASSES: [usize; 14] = [
    16, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768, 1024, 2048, 4096,
];

/// Blocks carved per request to the page source.
pub const DEFAULT_CENTRAL_BATCH: usize = 64;

/// Blocks moved between a thread cache and the central store at once.
pub const DEFAULT_CACHE_BATCH: usize = 32;

/// Thread-cache occupancy above which excess blocks go back to the central store.
pub const DEFAULT_HIGH_WATERMARK: usize = 128;

/// Process exit codes used by the `segpool` binary.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Generic error.
    pub const ERROR_GENERIC: i32 = 1;
    /// The page source ran out of memory.
    pub const ERROR_OUT_OF_MEMORY: i32 = 2;
    /// Blocks were lost or duplicated during a run.
    pub const ERROR_CONSERVATION: i32 = 3;
    /// Invalid configuration.
    pub const ERROR_CONFIG: i32 = 4;
}
