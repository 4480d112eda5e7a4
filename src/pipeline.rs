//! Run orchestrator: polls every device in order, aggregates, submits,
//! and records the execution in the history file.

use crate::aggregate::{aggregate, AggregateTotal, PowerReading};
use crate::config::Config;
use crate::enrich::{fetch_voltage, fetch_weather};
use crate::extract::extract_power;
use crate::fetch::fetch_device;
use crate::stats::{ExecutionRecord, HistoryStore};
use crate::submit::{submit, Enrichment, SubmissionResult};
use chrono::Local;
use std::time::{Duration, Instant};

/// Everything one execution produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub readings: Vec<PowerReading>,
    pub aggregate: AggregateTotal,
    /// `None` when submission was skipped (no device produced a value).
    pub submission: Option<SubmissionResult>,
    pub total_attempts: u32,
    pub duration: Duration,
}

impl RunOutcome {
    /// The automation contract: true only when the report was delivered.
    pub fn is_success(&self) -> bool {
        self.submission.as_ref().is_some_and(|s| s.success)
    }
}

/// Execute one full collection-aggregation-submission pass.
///
/// Devices are polled one at a time in configured order with a fixed pause
/// between them; there is no overall deadline, the external scheduler owns
/// that. History write failures are surfaced as warnings only, since by
/// then the value has already been sent.
pub async fn run(config: &Config, client: &reqwest::Client, store: &HistoryStore) -> RunOutcome {
    let started = Instant::now();
    let device_delay = Duration::from_secs(config.polling.device_delay_secs);

    let mut readings = Vec::with_capacity(config.devices.len());
    let mut total_attempts = 0u32;

    for (device_index, target) in config.devices.iter().enumerate() {
        tracing::info!(device = device_index, host = %target.host, "polling device");
        let fetched = fetch_device(client, target, &config.polling).await;
        total_attempts += fetched.attempts;

        let value = fetched.body.as_deref().and_then(extract_power);
        match value {
            Some(watts) => tracing::info!(device = device_index, watts, "device reading"),
            None => tracing::warn!(
                device = device_index,
                attempts = fetched.attempts,
                error = fetched.error.as_deref().unwrap_or("no power token in body"),
                "no usable reading from device"
            ),
        }
        readings.push(PowerReading {
            device_index,
            value,
        });

        if device_index + 1 < config.devices.len() && !device_delay.is_zero() {
            tokio::time::sleep(device_delay).await;
        }
    }

    let totals = aggregate(&readings);
    tracing::info!(
        total = totals.total,
        successful = totals.successful_count,
        fallback = totals.fallback_count,
        "aggregated device readings"
    );

    let submission = if totals.is_critical() {
        tracing::error!("no device produced a usable value, skipping submission");
        None
    } else {
        let enrichment = gather_enrichment(config, client).await;
        Some(submit(client, &config.reporting, totals.total, &enrichment).await)
    };

    let duration = started.elapsed();
    let devices_ok = totals.successful_count;
    let record = ExecutionRecord {
        timestamp: Local::now(),
        total_watts: totals.total,
        submitted: submission.as_ref().is_some_and(|s| s.success),
        duration_ms: duration.as_millis() as u64,
        devices_ok,
        devices_failed: readings.len() - devices_ok,
        total_attempts,
    };
    if let Err(e) = store.append(Local::now().date_naive(), record) {
        tracing::warn!(error = %e, "failed to record execution in history");
    }

    RunOutcome {
        readings,
        aggregate: totals,
        submission,
        total_attempts,
        duration,
    }
}

async fn gather_enrichment(config: &Config, client: &reqwest::Client) -> Enrichment {
    let weather = match &config.weather {
        Some(cfg) => fetch_weather(client, cfg).await,
        None => None,
    };
    let voltage = match &config.voltage {
        Some(cfg) => fetch_voltage(client, cfg).await,
        None => None,
    };
    Enrichment { weather, voltage }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceTarget, PollingConfig, ReportingConfig};
    use tempfile::tempdir;

    fn unreachable_config() -> Config {
        Config {
            devices: vec![DeviceTarget {
                host: "256.256.256.256".to_string(),
                port: 80,
                username: "admin".to_string(),
                password: "admin".to_string(),
                path: "/status.html".to_string(),
            }],
            polling: PollingConfig {
                timeout_secs: 1,
                max_retries: 1,
                retry_base_delay_secs: 0,
                device_delay_secs: 0,
            },
            reporting: ReportingConfig {
                endpoint: "http://256.256.256.256/addstatus.jsp".to_string(),
                api_key: "k".to_string(),
                system_id: 1,
                timeout_secs: 1,
            },
            weather: None,
            voltage: None,
            history_path: String::new(),
        }
    }

    #[tokio::test]
    async fn test_all_devices_down_skips_submission_and_records_failure() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        let client = reqwest::Client::new();
        let config = unreachable_config();

        let outcome = run(&config, &client, &store).await;

        assert!(outcome.aggregate.is_critical());
        assert_eq!(outcome.aggregate.total, 0);
        assert!(outcome.submission.is_none());
        assert!(!outcome.is_success());
        assert_eq!(outcome.total_attempts, 1);

        let entry = store.load_day(Local::now().date_naive()).unwrap();
        assert_eq!(entry.executions_total, 1);
        assert_eq!(entry.executions_failed, 1);
        assert!(!entry.executions[0].submitted);
        assert_eq!(entry.executions[0].devices_ok, 0);
        assert_eq!(entry.executions[0].devices_failed, 1);
    }
}
