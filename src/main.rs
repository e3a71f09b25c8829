use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use predict_loadtest::config::{HarnessConfig, MissingFieldPolicy, RetryMode};
use predict_loadtest::harness::{Harness, HarnessError};
use predict_loadtest::services::{cancel, report};
use predict_loadtest::telemetry;

/// Fire concurrent classification requests at a predict endpoint and report latency.
///
/// Every flag falls back to the matching `LOADTEST_*` environment variable
/// (or `.env`), then to the built-in default.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Image to classify
    #[arg(long)]
    infile: PathBuf,

    /// Predict endpoint [default: http://localhost:8000/predict]
    #[arg(long)]
    url: Option<String>,

    /// Number of concurrent jobs [default: 1]
    #[arg(long)]
    jobs: Option<usize>,

    /// CSV output path [default: results.csv]
    #[arg(long)]
    outfile: Option<PathBuf>,

    /// fail-fast or retry-until-success [default: fail-fast]
    #[arg(long)]
    retry_mode: Option<RetryMode>,

    /// tolerate or reject success bodies missing label fields [default: per retry mode]
    #[arg(long)]
    missing_fields: Option<MissingFieldPolicy>,

    /// Per-request HTTP timeout in seconds [default: 30]
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Cancel unfinished jobs after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Cap on concurrent in-flight requests
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Send the file bytes as-is instead of re-encoding to JPEG
    #[arg(long)]
    no_transcode: bool,

    /// Serve Prometheus metrics on this address during the run
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

impl Cli {
    fn apply(self, mut config: HarnessConfig) -> (HarnessConfig, PathBuf) {
        if let Some(url) = self.url {
            config.url = url;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(outfile) = self.outfile {
            config.outfile = outfile;
        }
        if let Some(mode) = self.retry_mode {
            config.retry_mode = mode;
        }
        if self.missing_fields.is_some() {
            config.missing_fields = self.missing_fields;
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
        if self.deadline_secs.is_some() {
            config.deadline_secs = self.deadline_secs;
        }
        if self.max_in_flight.is_some() {
            config.max_in_flight = self.max_in_flight;
        }
        if self.no_transcode {
            config.transcode = false;
        }
        if self.metrics_addr.is_some() {
            config.metrics_addr = self.metrics_addr;
        }
        (config, self.infile)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Load test aborted");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = HarnessConfig::from_env().map_err(HarnessError::from)?;
    let (config, infile) = cli.apply(config);

    telemetry::init_metrics(config.metrics_addr)?;

    let harness = Harness::setup(config, &infile)?;
    let concurrency = harness.config().effective_concurrency();
    let mode = harness.config().retry_mode;

    let (handle, cancellation) = cancel::cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling outstanding jobs");
            handle.cancel();
        }
    });

    let report = harness.run(cancellation).await?;

    print!("{}", report::render_summary(concurrency, mode, &report.summary));
    Ok(())
}
