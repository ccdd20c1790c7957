//! Error handling and exit codes.

use segpool_core::constants::exit_codes;
use segpool_core::PoolError;

/// Blocks were missing from the central stores after every worker finished.
#[derive(Debug, thiserror::Error)]
#[error("{outstanding} blocks were not returned by the end of the run")]
pub struct ConservationError {
    /// Blocks carved but not back in any central store.
    pub outstanding: usize,
}

/// Map a pool error to its exit code.
pub fn exit_code(err: &PoolError) -> i32 {
    match err {
        PoolError::OutOfMemory { .. } | PoolError::Exhausted { .. } => {
            exit_codes::ERROR_OUT_OF_MEMORY
        }
        PoolError::InvalidBlockSize { .. }
        | PoolError::UnknownSizeClass { .. }
        | PoolError::Config(_) => exit_codes::ERROR_CONFIG,
    }
}

/// Map any application error to its exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(pool_err) = err.downcast_ref::<PoolError>() {
        exit_code(pool_err)
    } else if err.downcast_ref::<ConservationError>().is_some() {
        exit_codes::ERROR_CONSERVATION
    } else {
        exit_codes::ERROR_GENERIC
    }
}
