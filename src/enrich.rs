//! Enrichment collaborators: single-shot fetchers for ambient weather and
//! grid-voltage readings. Both are best-effort; any failure yields `None`.

use crate::config::CollaboratorConfig;
use serde::Deserialize;
use std::time::Duration;

/// Current weather observation from the station lookup service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherObservation {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    #[serde(rename = "solarRadiation")]
    pub solar_radiation: Option<f64>,
    pub uv: Option<f64>,
    #[serde(rename = "windSpeed")]
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
}

/// One electrical phase as reported by the Shelly meter.
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseReading {
    pub voltage: Option<f64>,
    pub power: Option<f64>,
    #[serde(default)]
    pub phase: u8,
}

/// Fetch the current weather observation, or `None` if the collaborator is
/// unavailable or returned garbage.
pub async fn fetch_weather(
    client: &reqwest::Client,
    cfg: &CollaboratorConfig,
) -> Option<WeatherObservation> {
    match fetch_json::<WeatherObservation>(client, cfg).await {
        Ok(observation) => Some(observation),
        Err(e) => {
            tracing::warn!(url = %cfg.url, error = %e, "weather fetch failed, submitting without it");
            None
        }
    }
}

/// Fetch one phase's voltage reading, or `None` on any failure.
pub async fn fetch_voltage(
    client: &reqwest::Client,
    cfg: &CollaboratorConfig,
) -> Option<PhaseReading> {
    match fetch_json::<PhaseReading>(client, cfg).await {
        Ok(reading) => Some(reading),
        Err(e) => {
            tracing::warn!(url = %cfg.url, error = %e, "voltage fetch failed, submitting without it");
            None
        }
    }
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    cfg: &CollaboratorConfig,
) -> Result<T, reqwest::Error> {
    client
        .get(&cfg.url)
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .send()
        .await?
        .error_for_status()?
        .json::<T>()
        .await
}
