//! Blocking fixed-window rate limiter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use windowgate_core::DomainError;
use windowgate_core::domain::RateLimitOptions;
use windowgate_core::ports::{Admission, CounterStore, RateLimitError};

/// Shortest wait between attempts, used when the store reports the window
/// as already reset or has no counter.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(10);

/// Fixed-window rate limiter for one named resource.
///
/// At most `rate_limit` calls to [`process`](Self::process) complete within
/// each window, across every limiter (in any process) that shares the same
/// key and counter store. The limiter keeps no counters itself, so it is
/// cheap to build per call site and discard.
#[derive(Clone)]
pub struct RateLimiter {
    key: String,
    options: RateLimitOptions,
    store: Arc<dyn CounterStore>,
    min_backoff: Duration,
}

impl RateLimiter {
    pub fn new(
        key: impl Into<String>,
        options: RateLimitOptions,
        store: Arc<dyn CounterStore>,
    ) -> Result<Self, RateLimitError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(DomainError::InvalidKey.into());
        }

        Ok(Self {
            key,
            options,
            store,
            min_backoff: DEFAULT_MIN_BACKOFF,
        })
    }

    /// Build from raw limit and window (seconds), rejecting zero values.
    pub fn with_options(
        key: impl Into<String>,
        rate_limit: u32,
        rate_limit_window: u64,
        store: Arc<dyn CounterStore>,
    ) -> Result<Self, RateLimitError> {
        let options = RateLimitOptions::new(rate_limit, rate_limit_window)?;
        Self::new(key, options, store)
    }

    pub fn with_min_backoff(mut self, min_backoff: Duration) -> Self {
        self.min_backoff = min_backoff;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> RateLimitOptions {
        self.options
    }

    /// Make one admission attempt without waiting.
    ///
    /// The attempt always increments the shared counter, even when it is
    /// refused.
    pub async fn try_process(&self) -> Result<Admission, RateLimitError> {
        let limit = u64::from(self.options.rate_limit());
        let count = self
            .store
            .increment(&self.key, self.options.window())
            .await?;

        if count <= limit {
            return Ok(Admission {
                allowed: true,
                count,
                remaining: limit - count,
                reset_after: self.options.window(),
            });
        }

        let reset_after = self
            .store
            .time_to_live(&self.key)
            .await?
            .unwrap_or_default()
            .max(self.min_backoff);

        Ok(Admission {
            allowed: false,
            count,
            remaining: 0,
            reset_after,
        })
    }

    /// Wait until this caller may proceed without exceeding the rate.
    ///
    /// Sleeps for the counter's remaining lifetime whenever the window is
    /// exhausted, then tries again. There is no retry cap and no timeout;
    /// see [`process_timeout`](Self::process_timeout). Waiting callers are
    /// not queued: whichever retries first after a reset is admitted first.
    ///
    /// Only counter store failures are returned as errors.
    pub async fn process(&self) -> Result<(), RateLimitError> {
        loop {
            let admission = self.try_process().await?;
            if admission.allowed {
                tracing::debug!(
                    key = %self.key,
                    count = admission.count,
                    remaining = admission.remaining,
                    "Rate limit admitted"
                );
                return Ok(());
            }

            tracing::debug!(
                key = %self.key,
                count = admission.count,
                limit = self.options.rate_limit(),
                wait_ms = admission.reset_after.as_millis() as u64,
                "Rate limit exhausted, waiting for window reset"
            );
            tokio::time::sleep(admission.reset_after).await;
        }
    }

    /// [`process`](Self::process), giving up after `timeout`.
    ///
    /// An abandoned wait has already spent one increment in each window it
    /// attempted; those are not refunded.
    pub async fn process_timeout(&self, timeout: Duration) -> Result<(), RateLimitError> {
        match tokio::time::timeout(timeout, self.process()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(key = %self.key, ?timeout, "Gave up waiting for rate limit");
                Err(RateLimitError::Timeout(timeout))
            }
        }
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("key", &self.key)
            .field("options", &self.options)
            .field("min_backoff", &self.min_backoff)
            .finish_non_exhaustive()
    }
}
