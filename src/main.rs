//! pvreport - inverter polling and PV report submission job
//!
//! Polls power values from local inverter endpoints, enriches them with
//! weather and grid-voltage readings, and forwards the aggregated total to
//! the reporting endpoint. Intended to run under an external scheduler;
//! exit status 0 means the report was delivered.

mod aggregate;
mod config;
mod enrich;
mod extract;
mod fetch;
mod pipeline;
mod stats;
mod submit;

use config::Config;
use stats::HistoryStore;

use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pvreport=info".parse().expect("valid directive")),
        )
        .init();

    // Load configuration
    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(devices = cfg.devices.len(), "starting pvreport run");

    let client = match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let store = HistoryStore::new(&cfg.history_path);

    let outcome = pipeline::run(&cfg, &client, &store).await;
    tracing::info!(
        total_watts = outcome.aggregate.total,
        devices_ok = outcome.aggregate.successful_count,
        fallback = outcome.aggregate.fallback_count,
        attempts = outcome.total_attempts,
        duration_ms = outcome.duration.as_millis() as u64,
        delivered = outcome.is_success(),
        "run finished"
    );

    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
