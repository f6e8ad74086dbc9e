//! Probe configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use windowgate_core::DomainError;
use windowgate_core::domain::{RateLimitOptions, SlackTier};

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Resource key every caller contends on.
    pub key: String,
    /// Number of concurrent callers.
    pub callers: usize,
    pub options: RateLimitOptions,
    /// Per-caller wait limit; unbounded when unset.
    pub timeout: Option<Duration>,
}

impl ProbeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// `RATE_LIMIT_SLACK_TIER` takes precedence over
    /// `RATE_LIMIT_MAX_REQUESTS` / `RATE_LIMIT_WINDOW_SECS`.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, DomainError> {
        let options = match get("RATE_LIMIT_SLACK_TIER") {
            Some(tier) => tier.parse::<SlackTier>()?.options(),
            None => RateLimitOptions::new(
                get("RATE_LIMIT_MAX_REQUESTS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
                get("RATE_LIMIT_WINDOW_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            )?,
        };

        Ok(Self {
            key: get("PROBE_KEY").unwrap_or_else(|| "slack:probe".to_string()),
            callers: get("PROBE_CALLERS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            options,
            timeout: get("PROBE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
        })
    }
}
