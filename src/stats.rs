//! Daily statistics store: a rolling JSON history of execution outcomes,
//! keyed by calendar date (`YYYYMMDD`) and pruned to a 30-day window.
//!
//! The whole document is read, modified, and written back on every append.
//! Invocations are not synchronized against each other; at the expected
//! cadence (one run per ≥5 minutes) an overlap losing one update is an
//! accepted risk.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Date buckets strictly older than this many days are deleted on append.
pub const RETENTION_DAYS: i64 = 30;

/// History error types.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("failed to write history file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One run's outcome. Never mutated after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Local>,
    pub total_watts: i64,
    pub submitted: bool,
    pub duration_ms: u64,
    pub devices_ok: usize,
    pub devices_failed: usize,
    pub total_attempts: u32,
}

/// Derived per-date aggregate, recomputed incrementally on each append.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayEntry {
    pub executions_total: u64,
    pub executions_successful: u64,
    pub executions_failed: u64,
    /// Power values from successful submissions only.
    pub power_values: Vec<i64>,
    pub max_power: Option<i64>,
    pub min_power: Option<i64>,
    pub avg_power: f64,
    pub executions: Vec<ExecutionRecord>,
}

impl DayEntry {
    fn record(&mut self, record: ExecutionRecord) {
        self.executions_total += 1;
        if record.submitted {
            self.executions_successful += 1;
            let v = record.total_watts;
            self.power_values.push(v);
            self.max_power = Some(self.max_power.map_or(v, |m| m.max(v)));
            self.min_power = Some(self.min_power.map_or(v, |m| m.min(v)));
            let n = self.power_values.len() as f64;
            self.avg_power += (v as f64 - self.avg_power) / n;
        } else {
            self.executions_failed += 1;
        }
        self.executions.push(record);
    }
}

/// The full history document: date key (`YYYYMMDD`) → day entry.
pub type History = BTreeMap<String, DayEntry>;

/// File-backed statistics store. Owns the persisted history exclusively.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the history document. A missing or empty file is an empty
    /// history; a malformed file degrades to an empty history with a
    /// warning rather than aborting the run.
    pub fn load(&self) -> History {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return History::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "history unreadable, starting empty");
                return History::new();
            }
        };
        if contents.trim().is_empty() {
            return History::new();
        }
        match serde_json::from_str(&contents) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "history malformed, starting empty");
                History::new()
            }
        }
    }

    /// Get the entry for one date, if present.
    pub fn load_day(&self, date: NaiveDate) -> Option<DayEntry> {
        self.load().remove(&date_key(date))
    }

    /// Append one execution record under `date`, prune buckets older than
    /// the retention window, and write the document back in full.
    pub fn append(&self, date: NaiveDate, record: ExecutionRecord) -> Result<(), HistoryError> {
        let mut history = self.load();
        history.entry(date_key(date)).or_default().record(record);
        prune(&mut history, date);
        self.write(&history)
    }

    fn write(&self, history: &History) -> Result<(), HistoryError> {
        let encoded = serde_json::to_string_pretty(history)?;
        std::fs::write(&self.path, encoded)?;
        Ok(())
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Delete every bucket strictly older than `date - RETENTION_DAYS`.
/// Keys are fixed-width `YYYYMMDD`, so string order is date order.
fn prune(history: &mut History, date: NaiveDate) {
    let cutoff = date_key(date - ChronoDuration::days(RETENTION_DAYS));
    history.retain(|key, _| key.as_str() >= cutoff.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(watts: i64, submitted: bool) -> ExecutionRecord {
        ExecutionRecord {
            timestamp: Local::now(),
            total_watts: watts,
            submitted,
            duration_ms: 1200,
            devices_ok: 2,
            devices_failed: 1,
            total_attempts: 5,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_malformed_file_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json at all").unwrap();
        let store = HistoryStore::new(&path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_append_creates_bucket_and_updates_summary() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        let day = date(2024, 6, 15);

        store.append(day, record(7350, true)).unwrap();
        store.append(day, record(6100, true)).unwrap();
        store.append(day, record(0, false)).unwrap();

        let entry = store.load_day(day).unwrap();
        assert_eq!(entry.executions_total, 3);
        assert_eq!(entry.executions_successful, 2);
        assert_eq!(entry.executions_failed, 1);
        assert_eq!(entry.power_values, vec![7350, 6100]);
        assert_eq!(entry.max_power, Some(7350));
        assert_eq!(entry.min_power, Some(6100));
        assert!((entry.avg_power - 6725.0).abs() < f64::EPSILON);
        assert_eq!(entry.executions.len(), 3);
    }

    #[test]
    fn test_append_prunes_old_buckets() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));

        // 40 and 31 days before the append date: both past retention.
        store.append(date(2024, 5, 6), record(100, true)).unwrap();
        store.append(date(2024, 5, 15), record(200, true)).unwrap();
        // Exactly 30 days before: kept.
        store.append(date(2024, 5, 16), record(300, true)).unwrap();

        store.append(date(2024, 6, 15), record(400, true)).unwrap();

        let history = store.load();
        assert!(!history.contains_key("20240506"));
        assert!(!history.contains_key("20240515"));
        assert!(history.contains_key("20240516"));
        assert!(history.contains_key("20240615"));
    }

    #[test]
    fn test_history_survives_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        let day = date(2024, 6, 15);

        HistoryStore::new(&path).append(day, record(5000, true)).unwrap();

        // A fresh store over the same file sees the persisted entry.
        let entry = HistoryStore::new(&path).load_day(day).unwrap();
        assert_eq!(entry.power_values, vec![5000]);
        assert_eq!(entry.executions[0].total_watts, 5000);
        assert!(entry.executions[0].submitted);
    }
}
