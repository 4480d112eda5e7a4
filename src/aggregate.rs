//! Aggregator: combines per-device readings into a single total with an
//! average-based fallback for devices that failed to report.

use crate::extract::MAX_DEVICE_WATTS;

/// One device's reading, in configured device order. `value` is `None` when
/// fetching or extraction failed.
#[derive(Debug, Clone)]
pub struct PowerReading {
    pub device_index: usize,
    pub value: Option<i64>,
}

/// Combined total across all devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTotal {
    /// Total watts across all devices, with failed devices substituted
    /// by the rounded average of the successful ones.
    pub total: i64,
    /// Number of devices substituted with the average.
    pub fallback_count: usize,
    /// Number of devices that reported a valid value.
    pub successful_count: usize,
}

impl AggregateTotal {
    /// True when no device produced a usable value; callers escalate this
    /// as a critical condition.
    pub fn is_critical(&self) -> bool {
        self.successful_count == 0
    }
}

/// Compute the aggregate total.
///
/// A reading of exactly 0 W is a valid success and is counted, not
/// substituted; only a missing value triggers fallback. With zero
/// successful devices the total is forced to 0.
pub fn aggregate(readings: &[PowerReading]) -> AggregateTotal {
    let valid: Vec<i64> = readings
        .iter()
        .filter_map(|r| r.value)
        .filter(|v| (0..=MAX_DEVICE_WATTS).contains(v))
        .collect();

    if valid.is_empty() {
        return AggregateTotal {
            total: 0,
            fallback_count: 0,
            successful_count: 0,
        };
    }

    let sum: i64 = valid.iter().sum();
    // Round half away from zero, matching the wire-compatible behavior.
    let average = (sum as f64 / valid.len() as f64).round() as i64;

    let mut total = 0i64;
    let mut fallback_count = 0usize;
    for reading in readings {
        match reading.value.filter(|v| (0..=MAX_DEVICE_WATTS).contains(v)) {
            Some(v) => total += v,
            None => {
                total += average;
                fallback_count += 1;
            }
        }
    }

    AggregateTotal {
        total,
        fallback_count,
        successful_count: valid.len(),
    }
}
