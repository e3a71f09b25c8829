use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{ConfigError, HarnessConfig};
use crate::models::job::JobResult;
use crate::models::record::{Record, RunSummary};
use crate::services::cancel::Cancellation;
use crate::services::dispatch::Dispatcher;
use crate::services::executor::{Executor, RetryPolicy};
use crate::services::payload::{self, EncodedPayload, ImagePayload, PayloadError};
use crate::services::predict::{PredictClient, PredictError};
use crate::services::report::{ReportError, ReportWriter};

/// Everything produced by one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<JobResult>,
    pub records: Vec<Record>,
    pub summary: RunSummary,
}

/// A prepared load test: validated config, encoded payload, HTTP client and
/// an open output file. Setup errors surface here, before any request.
///
/// [`Harness::run`] consumes the harness, so the shared client is released
/// when the run returns on every path.
pub struct Harness {
    config: HarnessConfig,
    client: PredictClient,
    payload: Arc<EncodedPayload>,
    writer: ReportWriter,
}

impl Harness {
    /// Load and encode `infile`, then prepare the run.
    pub fn setup(config: HarnessConfig, infile: &Path) -> Result<Self, HarnessError> {
        let config = config.validated()?;
        let image = payload::load_image(infile, config.transcode)?;
        tracing::info!(
            path = %infile.display(),
            bytes = image.len(),
            transcode = config.transcode,
            "Loaded input image"
        );
        Self::with_image(config, &image)
    }

    pub fn with_image(config: HarnessConfig, image: &ImagePayload) -> Result<Self, HarnessError> {
        let config = config.validated()?;
        let payload = Arc::new(payload::encode_payload(image.as_bytes()));
        let client = PredictClient::new(config.url.clone(), config.request_timeout())?;
        let writer = ReportWriter::create(&config.outfile)?;

        Ok(Self {
            config,
            client,
            payload,
            writer,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Dispatch every job, wait for all of them, then write the results file.
    pub async fn run(self, cancellation: Cancellation) -> Result<RunReport, HarnessError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, url = %self.client.url());
        self.run_inner(cancellation).instrument(span).await
    }

    async fn run_inner(self, cancellation: Cancellation) -> Result<RunReport, HarnessError> {
        let Harness {
            config,
            client,
            payload,
            mut writer,
        } = self;

        let cancellation = match config.deadline() {
            Some(deadline) => cancellation.with_deadline(deadline),
            None => cancellation,
        };

        let executor = Executor::new(
            client,
            payload,
            RetryPolicy::from_config(&config),
            cancellation,
        );
        let dispatcher = Dispatcher::new(executor).with_max_in_flight(config.max_in_flight);

        let started = Instant::now();
        let results = dispatcher.run(config.jobs).await;
        let runtime = started.elapsed();
        drop(dispatcher);

        let report = summarize(results, runtime);
        tracing::info!(
            jobs = report.summary.total_jobs,
            success = report.summary.success_count,
            error = report.summary.error_count,
            runtime_ms = runtime.as_millis() as u64,
            "Run complete"
        );

        writer.write_records(&report.records)?;
        Ok(report)
    }
}

/// Build records and summary from finished results.
pub fn summarize(results: Vec<JobResult>, runtime: Duration) -> RunReport {
    let records = crate::services::aggregate::to_records(&results);
    let summary = RunSummary::from_records(&records, runtime);
    RunReport {
        results,
        records,
        summary,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] PredictError),

    #[error(transparent)]
    Report(#[from] ReportError),
}
