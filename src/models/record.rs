use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// One CSV row. Field order is the column order of the report file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub job_id: usize,
    pub predicted_label: Option<i64>,
    pub predicted_class: Option<String>,
    #[serde(serialize_with = "rfc3339_micros")]
    pub start_time: DateTime<Utc>,
    #[serde(serialize_with = "rfc3339_micros")]
    pub end_time: DateTime<Utc>,
    /// Seconds
    pub elapsed_time: f64,
}

impl Record {
    pub fn is_success(&self) -> bool {
        self.predicted_label.is_some()
    }
}

fn rfc3339_micros<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&value.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
}

/// Latency statistics over successful rows, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub mean: f64,
    /// Sample standard deviation; 0.0 when there is a single sample
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Aggregate view of one run, derived from its records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_jobs: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub runtime: Duration,
    /// `None` when no job succeeded
    pub latency: Option<LatencyStats>,
}

impl RunSummary {
    /// Completed jobs per second of batch wall-clock time.
    pub fn throughput(&self) -> f64 {
        let secs = self.runtime.as_secs_f64();
        if secs > 0.0 {
            self.total_jobs as f64 / secs
        } else {
            0.0
        }
    }
}
