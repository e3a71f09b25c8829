use std::time::Duration;

use crate::models::job::JobResult;
use crate::models::record::{LatencyStats, Record, RunSummary};

/// Flatten job results into report rows, preserving order.
pub fn to_records(results: &[JobResult]) -> Vec<Record> {
    results
        .iter()
        .map(|result| {
            let prediction = result.outcome.prediction();
            Record {
                job_id: result.job.job_id,
                predicted_label: prediction.and_then(|p| p.predicted_label),
                predicted_class: prediction.and_then(|p| p.predicted_class.clone()),
                start_time: result.job.start_time,
                end_time: result.job.end_time,
                elapsed_time: result.job.elapsed_secs(),
            }
        })
        .collect()
}

impl RunSummary {
    /// Counts and latency statistics. A row is a success when it has a
    /// `predicted_label`; latency covers successful rows only.
    pub fn from_records(records: &[Record], runtime: Duration) -> Self {
        let elapsed: Vec<f64> = records
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.elapsed_time)
            .collect();

        let success_count = elapsed.len();

        Self {
            total_jobs: records.len(),
            success_count,
            error_count: records.len() - success_count,
            runtime,
            latency: latency_stats(elapsed),
        }
    }
}

fn latency_stats(mut samples: Vec<f64>) -> Option<LatencyStats> {
    if samples.is_empty() {
        return None;
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let std_dev = if samples.len() > 1 {
        let sum_sq: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum();
        (sum_sq / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    samples.sort_by(|a, b| a.total_cmp(b));

    Some(LatencyStats {
        mean,
        std_dev,
        min: samples[0],
        max: samples[samples.len() - 1],
        p50: percentile(&samples, 50.0),
        p95: percentile(&samples, 95.0),
        p99: percentile(&samples, 99.0),
    })
}

/// Nearest-rank percentile over sorted, non-empty samples.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
