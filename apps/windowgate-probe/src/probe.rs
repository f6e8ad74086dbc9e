//! Concurrent callers contending on one limiter.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use windowgate_core::domain::RateLimitOptions;
use windowgate_core::ports::RateLimitError;
use windowgate_infra::RateLimiter;

use crate::state::Backend;

/// How a single caller fared.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallerOutcome {
    Admitted {
        caller: usize,
        waited_ms: u64,
        admitted_at: DateTime<Utc>,
    },
    TimedOut {
        caller: usize,
        waited_ms: u64,
    },
    /// The caller's task died before reporting back.
    Failed {
        caller: usize,
        waited_ms: u64,
        error: String,
    },
}

impl CallerOutcome {
    pub fn waited_ms(&self) -> u64 {
        match self {
            Self::Admitted { waited_ms, .. }
            | Self::TimedOut { waited_ms, .. }
            | Self::Failed { waited_ms, .. } => *waited_ms,
        }
    }
}

/// Probe run summary, printed as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub key: String,
    pub backend: Backend,
    pub options: RateLimitOptions,
    pub admitted: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub callers: Vec<CallerOutcome>,
}

/// Spawn `callers` tasks that each wait for admission on `limiter`.
///
/// Timeouts and panicked callers are reported per caller; a counter store
/// failure aborts the run.
pub async fn run(
    limiter: &RateLimiter,
    callers: usize,
    timeout: Option<Duration>,
    backend: Backend,
) -> Result<ProbeReport, RateLimitError> {
    let start = Instant::now();

    let handles: Vec<_> = (0..callers)
        .map(|caller| {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let result = match timeout {
                    Some(limit) => limiter.process_timeout(limit).await,
                    None => limiter.process().await,
                };
                let waited_ms = start.elapsed().as_millis() as u64;

                match result {
                    Ok(()) => {
                        tracing::info!(caller, waited_ms, "Caller admitted");
                        Ok(CallerOutcome::Admitted {
                            caller,
                            waited_ms,
                            admitted_at: Utc::now(),
                        })
                    }
                    Err(RateLimitError::Timeout(_)) => {
                        Ok(CallerOutcome::TimedOut { caller, waited_ms })
                    }
                    Err(e) => Err(e),
                }
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(callers);
    for (caller, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome?),
            Err(e) => {
                tracing::error!(caller, error = %e, "Caller task failed");
                outcomes.push(CallerOutcome::Failed {
                    caller,
                    waited_ms: start.elapsed().as_millis() as u64,
                    error: e.to_string(),
                });
            }
        }
    }
    outcomes.sort_by_key(CallerOutcome::waited_ms);

    let (mut admitted, mut timed_out, mut failed) = (0, 0, 0);
    for outcome in &outcomes {
        match outcome {
            CallerOutcome::Admitted { .. } => admitted += 1,
            CallerOutcome::TimedOut { .. } => timed_out += 1,
            CallerOutcome::Failed { .. } => failed += 1,
        }
    }

    Ok(ProbeReport {
        key: limiter.key().to_string(),
        backend,
        options: limiter.options(),
        admitted,
        timed_out,
        failed,
        callers: outcomes,
    })
}
