use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::RetryMode;
use crate::models::record::{Record, RunSummary};

/// Column order of the results file.
pub const HEADER: [&str; 6] = [
    "job_id",
    "predicted_label",
    "predicted_class",
    "start_time",
    "end_time",
    "elapsed_time",
];

/// CSV sink for run records.
///
/// Created before dispatch so an unwritable destination fails the run
/// before any request is sent.
pub struct ReportWriter<W: Write = File> {
    path: Option<PathBuf>,
    csv: csv::Writer<W>,
}

impl ReportWriter<File> {
    pub fn create(path: &Path) -> Result<Self, ReportError> {
        let file = File::create(path).map_err(|source| ReportError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let mut writer = Self::from_writer(file);
        writer.path = Some(path.to_path_buf());
        Ok(writer)
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        let csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        Self { path: None, csv }
    }

    /// Write the header and every record, then flush.
    pub fn write_records(&mut self, records: &[Record]) -> Result<(), ReportError> {
        self.csv.write_record(HEADER)?;
        for record in records {
            self.csv.serialize(record)?;
        }
        self.csv.flush().map_err(ReportError::Flush)?;

        if let Some(path) = &self.path {
            tracing::info!(path = %path.display(), rows = records.len(), "Results written");
        }
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, ReportError> {
        self.csv
            .into_inner()
            .map_err(|e| ReportError::Flush(e.into_error()))
    }
}

/// Console summary of a run. Latency lines appear only when something succeeded.
pub fn render_summary(concurrency: usize, mode: RetryMode, summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "configuration:");
    let _ = writeln!(out, "- concurrent jobs: {concurrency}");
    let _ = writeln!(out, "- retry mode: {mode}");
    let _ = writeln!(out, "results:");
    let _ = writeln!(out, "- total runtime: {:.3} s", summary.runtime.as_secs_f64());
    let _ = writeln!(out, "- success: {}", summary.success_count);
    let _ = writeln!(out, "- error: {}", summary.error_count);

    if let Some(latency) = summary.latency {
        let ms = |secs: f64| secs * 1000.0;
        let _ = writeln!(
            out,
            "- avg elapsed time: {:.3} ± {:.3} ms",
            ms(latency.mean),
            ms(2.0 * latency.std_dev)
        );
        let _ = writeln!(
            out,
            "- min/p50/p95/p99/max: {:.3}/{:.3}/{:.3}/{:.3}/{:.3} ms",
            ms(latency.min),
            ms(latency.p50),
            ms(latency.p95),
            ms(latency.p99),
            ms(latency.max)
        );
    }

    let _ = writeln!(out, "- throughput: {:.2} jobs/s", summary.throughput());
    out
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to open output file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write CSV record: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush output: {0}")]
    Flush(std::io::Error),
}
