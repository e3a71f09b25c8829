use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Logs go to stderr so the console summary on stdout stays clean. Set
/// `LOADTEST_LOG_JSON=1` for JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOADTEST_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Optionally expose a Prometheus scrape endpoint, then register metric descriptions.
///
/// Must run inside a tokio runtime when `listen` is set.
pub fn init_metrics(listen: Option<SocketAddr>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    if let Some(addr) = listen {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(%addr, "Prometheus metrics listener started");
    }

    metrics::describe_counter!(
        "predict_requests_total",
        "Prediction requests sent, including retries"
    );
    metrics::describe_counter!(
        "predict_request_failures_total",
        "Prediction attempts that failed, by failure kind"
    );
    metrics::describe_counter!(
        "predict_jobs_total",
        "Jobs that reached a terminal state, by outcome"
    );
    metrics::describe_histogram!(
        "predict_job_seconds",
        "Time from first attempt to terminal outcome per job"
    );

    Ok(())
}
