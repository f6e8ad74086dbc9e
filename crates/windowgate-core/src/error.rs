//! Domain-level error types.

use thiserror::Error;

/// Domain errors - invalid rate limit policies.
///
/// These are programming errors: a limiter built from them can never work,
/// so callers should fail fast instead of retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Rate limit key must not be empty")]
    InvalidKey,

    #[error("Rate limit must allow at least one operation per window")]
    InvalidLimit,

    #[error("Rate limit window must be between one second and one year")]
    InvalidWindow,

    #[error("Unknown Slack rate limit tier: {0}")]
    UnknownTier(String),
}
