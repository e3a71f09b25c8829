use garde::Validate;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use strum::{Display, EnumString};

const ENV_PREFIX: &str = "LOADTEST_";

/// How a job reacts to a failed attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RetryMode {
    /// One attempt; any failure is terminal.
    #[default]
    FailFast,
    /// Repeat without backoff or cap until a fully parsed success arrives
    /// or the run is cancelled.
    RetryUntilSuccess,
}

impl RetryMode {
    /// Missing-field handling used when none is configured explicitly.
    pub fn default_missing_fields(self) -> MissingFieldPolicy {
        match self {
            RetryMode::FailFast => MissingFieldPolicy::Tolerate,
            RetryMode::RetryUntilSuccess => MissingFieldPolicy::Reject,
        }
    }
}

/// What to do with a 200 response that lacks `predicted_label` or `predicted_class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MissingFieldPolicy {
    /// Accept the response and report the missing values as absent.
    Tolerate,
    /// Treat the response as a failed attempt.
    Reject,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HarnessConfig {
    /// Predict endpoint (e.g., "http://localhost:8000/predict")
    #[serde(default = "default_url")]
    #[garde(custom(http_url))]
    pub url: String,

    /// Number of jobs to dispatch; also the concurrency level unless capped
    #[serde(default = "default_jobs")]
    #[garde(skip)]
    pub jobs: usize,

    /// CSV output path
    #[serde(default = "default_outfile")]
    #[garde(skip)]
    pub outfile: PathBuf,

    #[serde(default)]
    #[garde(skip)]
    pub retry_mode: RetryMode,

    /// Overrides the per-mode default from [`RetryMode::default_missing_fields`]
    #[serde(default)]
    #[garde(skip)]
    pub missing_fields: Option<MissingFieldPolicy>,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[garde(range(min = 1))]
    pub timeout_secs: u64,

    /// Cancels every unfinished job once this many seconds have passed since dispatch
    #[serde(default)]
    #[garde(range(min = 1))]
    pub deadline_secs: Option<u64>,

    /// Upper bound on in-flight requests. Unset means full fan-out.
    #[serde(default)]
    #[garde(range(min = 1))]
    pub max_in_flight: Option<usize>,

    /// Re-encode the input image as RGB JPEG before sending
    #[serde(default = "default_transcode")]
    #[garde(skip)]
    pub transcode: bool,

    /// Prometheus scrape listener. Optional.
    #[serde(default)]
    #[garde(skip)]
    pub metrics_addr: Option<SocketAddr>,
}

fn default_url() -> String {
    "http://localhost:8000/predict".to_string()
}

fn default_jobs() -> usize {
    1
}

fn default_outfile() -> PathBuf {
    PathBuf::from("results.csv")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_transcode() -> bool {
    true
}

fn http_url(value: &str, _ctx: &()) -> garde::Result {
    let parsed = reqwest::Url::parse(value)
        .map_err(|e| garde::Error::new(format!("invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(garde::Error::new(format!("unsupported URL scheme: {other}"))),
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            jobs: default_jobs(),
            outfile: default_outfile(),
            retry_mode: RetryMode::default(),
            missing_fields: None,
            timeout_secs: default_timeout_secs(),
            deadline_secs: None,
            max_in_flight: None,
            transcode: default_transcode(),
            metrics_addr: None,
        }
    }
}

impl HarnessConfig {
    /// Load `LOADTEST_*` variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        envy::prefixed(ENV_PREFIX)
            .from_env()
            .map_err(ConfigError::Env)
    }

    /// Run garde validation, returning the config unchanged on success.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate().map_err(ConfigError::Invalid)?;
        Ok(self)
    }

    pub fn missing_field_policy(&self) -> MissingFieldPolicy {
        self.missing_fields
            .unwrap_or_else(|| self.retry_mode.default_missing_fields())
    }

    /// Requests that can actually be in flight at once.
    pub fn effective_concurrency(&self) -> usize {
        match self.max_in_flight {
            Some(limit) => self.jobs.min(limit),
            None => self.jobs,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}
