//! Rate limiting port types.

use std::time::Duration;

use crate::error::DomainError;
use crate::ports::CounterStoreError;

/// Result of a single admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// Counter value after this attempt's increment.
    pub count: u64,
    pub remaining: u64,
    /// Time until the current window resets. Admitted attempts report the
    /// full window as an upper bound.
    pub reset_after: Duration,
}

/// Rate limit errors.
///
/// An exhausted window is not an error: `process()` waits it out.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Invalid rate limiter configuration: {0}")]
    Config(#[from] DomainError),

    #[error("Counter store error: {0}")]
    Store(#[from] CounterStoreError),

    #[error("Timed out after {0:?} waiting for admission")]
    Timeout(Duration),
}
