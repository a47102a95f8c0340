//! Error types for the limiter and its store.

use std::time::Duration;

use thiserror::Error;

/// Failures reaching or talking to the shared window store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Store operation failed: {0}")]
    Operation(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Rate limiter errors.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The shared store could not be reached. Callers decide whether this
    /// admits or denies (see `FailurePolicy`).
    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Rejected at construction time, never at call time.
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfiguration(String),
}

impl RateLimitError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, RateLimitError::StoreUnavailable(_))
    }
}
