//! Submission client: posts the aggregated total (plus optional enrichment
//! fields) to the PVOutput-compatible reporting endpoint.
//!
//! Wire contract: form-encoded POST with `d` (YYYYMMDD), `t` (HH:MM),
//! `v2` (watts) and optional `v5..v11`, authenticated with the
//! `X-Pvoutput-Apikey` and `X-Pvoutput-SystemId` headers.

use crate::config::ReportingConfig;
use crate::enrich::{PhaseReading, WeatherObservation};
use chrono::{DateTime, Local};
use std::time::Duration;
use thiserror::Error;

/// Totals above this are rejected locally, without a network call.
pub const MAX_SUBMIT_WATTS: i64 = 10_000_000;

/// Submission error types.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("total {0} W outside accepted range [0, {MAX_SUBMIT_WATTS}]")]
    TotalOutOfRange(i64),
    #[error("network error: {0}")]
    Network(String),
}

/// Optional enrichment data attached to a submission.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub weather: Option<WeatherObservation>,
    pub voltage: Option<PhaseReading>,
}

/// Outcome of one submission attempt.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub success: bool,
    pub http_status: Option<u16>,
    pub response_body: Option<String>,
    pub error: Option<String>,
}

impl SubmissionResult {
    fn failed(error: String) -> Self {
        Self {
            success: false,
            http_status: None,
            response_body: None,
            error: Some(error),
        }
    }
}

/// Build the form payload for a submission at the given local time.
///
/// Each enrichment field is independently range-validated; fields failing
/// their check are silently omitted, never an error.
pub fn build_payload(
    now: DateTime<Local>,
    total_watts: i64,
    enrichment: &Enrichment,
) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("d", now.format("%Y%m%d").to_string()),
        ("t", now.format("%H:%M").to_string()),
        ("v2", total_watts.to_string()),
    ];

    if let Some(weather) = &enrichment.weather {
        push_rounded(&mut form, "v5", weather.temperature, -100.0, 100.0);
    }
    if let Some(phase) = &enrichment.voltage {
        push_rounded(&mut form, "v6", phase.voltage, 0.0, 500.0);
    }
    if let Some(weather) = &enrichment.weather {
        if let Some(humidity) = weather.humidity {
            if (0.0..=100.0).contains(&humidity) {
                form.push(("v7", format!("{:.0}", humidity)));
            }
        }
        push_rounded(&mut form, "v8", weather.solar_radiation, 0.0, f64::MAX);
        push_rounded(&mut form, "v9", weather.uv, 0.0, f64::MAX);
        push_rounded(&mut form, "v10", weather.wind_speed, 0.0, f64::MAX);
        push_rounded(&mut form, "v11", weather.pressure, 800.0, 1200.0);
    }

    form
}

fn push_rounded(
    form: &mut Vec<(&'static str, String)>,
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) {
    if let Some(v) = value {
        if (min..=max).contains(&v) {
            form.push((field, format!("{:.1}", v)));
        }
    }
}

/// Submit the total exactly once; no retry at this layer.
pub async fn submit(
    client: &reqwest::Client,
    cfg: &ReportingConfig,
    total_watts: i64,
    enrichment: &Enrichment,
) -> SubmissionResult {
    if !(0..=MAX_SUBMIT_WATTS).contains(&total_watts) {
        let e = SubmitError::TotalOutOfRange(total_watts);
        tracing::error!(total_watts, "refusing to submit out-of-range total");
        return SubmissionResult::failed(e.to_string());
    }

    let form = build_payload(Local::now(), total_watts, enrichment);
    tracing::debug!(?form, "submitting report");

    let response = client
        .post(&cfg.endpoint)
        .header("X-Pvoutput-Apikey", &cfg.api_key)
        .header("X-Pvoutput-SystemId", cfg.system_id.to_string())
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .form(&form)
        .send()
        .await;

    match response {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            let success = (200..300).contains(&status);
            if success {
                tracing::info!(status, "submission accepted");
            } else {
                tracing::error!(status, body = %body, "submission rejected");
            }
            SubmissionResult {
                success,
                http_status: Some(status),
                response_body: Some(body),
                error: if success {
                    None
                } else {
                    Some(format!("HTTP status {}", status))
                },
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "submission transport failure");
            SubmissionResult::failed(SubmitError::Network(e.to_string()).to_string())
        }
    }
}
