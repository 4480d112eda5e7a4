//! Device fetcher: one HTTP GET against an inverter endpoint, with retry
//! and exponential backoff.

use crate::config::{DeviceTarget, PollingConfig};
use std::time::Duration;
use thiserror::Error;

/// Client header sent on every device request.
pub const USER_AGENT: &str = "pvreport/0.1";

/// Fetch error types.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("empty response body")]
    EmptyBody,
}

/// Outcome of contacting one device. Not persisted; consumed immediately
/// by the power extractor.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub success: bool,
    pub body: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
}

impl FetchResult {
    fn ok(body: String, attempts: u32) -> Self {
        Self {
            success: true,
            body: Some(body),
            error: None,
            attempts,
        }
    }

    fn failed(error: FetchError, attempts: u32) -> Self {
        Self {
            success: false,
            body: None,
            error: Some(error.to_string()),
            attempts,
        }
    }
}

/// Backoff delay before the attempt following failed attempt `attempt` (1-based):
/// `base * 2^(attempt-1)`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Poll one device, retrying up to `opts.max_retries` times with exponential
/// backoff between attempts. Sleeps are real waits and count toward the run's
/// wall-clock duration. Never sleeps after the final attempt.
pub async fn fetch_device(
    client: &reqwest::Client,
    target: &DeviceTarget,
    opts: &PollingConfig,
) -> FetchResult {
    let timeout = Duration::from_secs(opts.timeout_secs);
    let base_delay = Duration::from_secs(opts.retry_base_delay_secs);
    let url = target.url();

    let mut last_error = FetchError::Network("no attempt made".to_string());

    for attempt in 1..=opts.max_retries {
        match attempt_fetch(client, target, &url, timeout).await {
            Ok(body) => {
                tracing::debug!(%url, attempt, "device responded");
                return FetchResult::ok(body, attempt);
            }
            Err(e) => {
                tracing::warn!(%url, attempt, error = %e, "device fetch failed");
                last_error = e;
            }
        }

        if attempt < opts.max_retries {
            let delay = backoff_delay(base_delay, attempt);
            tracing::debug!(%url, ?delay, "backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }

    FetchResult::failed(last_error, opts.max_retries)
}

async fn attempt_fetch(
    client: &reqwest::Client,
    target: &DeviceTarget,
    url: &str,
    timeout: Duration,
) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .basic_auth(&target.username, Some(&target.password))
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::CONNECTION, "close")
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

    // The status is always inspectable here; only [200,400) counts as success.
    let status = response.status().as_u16();
    if !(200..400).contains(&status) {
        return Err(FetchError::Status(status));
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;

    if body.is_empty() {
        return Err(FetchError::EmptyBody);
    }

    Ok(body)
}
