//! # Windowgate Probe
//!
//! Runs a burst of concurrent callers through one shared rate limit and
//! prints when each was admitted.

mod config;
mod probe;
mod state;
mod telemetry;

use config::ProbeConfig;
use telemetry::TelemetryConfig;
use windowgate_infra::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = ProbeConfig::from_env()?;

    tracing::info!(
        key = %config.key,
        callers = config.callers,
        rate_limit = config.options.rate_limit(),
        window_secs = config.options.window_secs(),
        "Starting probe"
    );

    let (store, backend) = state::build_store().await?;
    let limiter = RateLimiter::new(config.key.clone(), config.options, store)?;

    let report = probe::run(&limiter, config.callers, config.timeout, backend).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
