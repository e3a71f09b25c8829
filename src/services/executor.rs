use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{HarnessConfig, MissingFieldPolicy, RetryMode};
use crate::models::job::{FailureKind, Job, JobResult, Outcome};
use crate::services::cancel::Cancellation;
use crate::services::payload::EncodedPayload;
use crate::services::predict::{PredictClient, PredictError};

/// Retry behaviour for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub mode: RetryMode,
    pub missing_fields: MissingFieldPolicy,
}

impl RetryPolicy {
    pub fn fail_fast() -> Self {
        Self::for_mode(RetryMode::FailFast)
    }

    pub fn retry_until_success() -> Self {
        Self::for_mode(RetryMode::RetryUntilSuccess)
    }

    pub fn for_mode(mode: RetryMode) -> Self {
        Self {
            mode,
            missing_fields: mode.default_missing_fields(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            mode: config.retry_mode,
            missing_fields: config.missing_field_policy(),
        }
    }
}

/// Runs a single job to a terminal outcome.
///
/// `start_time` is taken once before the first attempt and `end_time` once
/// the job is terminal, so under retry-until-success the elapsed time spans
/// every failed attempt as well as the final one.
#[derive(Debug, Clone)]
pub struct Executor {
    client: PredictClient,
    payload: Arc<EncodedPayload>,
    policy: RetryPolicy,
    cancellation: Cancellation,
}

impl Executor {
    pub fn new(
        client: PredictClient,
        payload: Arc<EncodedPayload>,
        policy: RetryPolicy,
        cancellation: Cancellation,
    ) -> Self {
        Self {
            client,
            payload,
            policy,
            cancellation,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn execute(&self, job_id: usize) -> JobResult {
        let start_time = Utc::now();
        let started = Instant::now();
        let mut attempts: u32 = 0;

        let outcome = loop {
            if self.cancellation.is_cancelled() {
                break cancelled(job_id, attempts);
            }

            attempts += 1;
            metrics::counter!("predict_requests_total").increment(1);

            let attempt = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => None,
                result = self.client.predict(job_id, &self.payload, self.policy.missing_fields) => Some(result),
            };

            let error = match attempt {
                None => break cancelled(job_id, attempts),
                Some(Ok(prediction)) => break Outcome::Success(prediction),
                Some(Err(error)) => error,
            };

            let kind: &'static str = error.kind().into();
            metrics::counter!("predict_request_failures_total", "kind" => kind).increment(1);

            match self.policy.mode {
                RetryMode::FailFast => {
                    tracing::warn!(
                        job_id,
                        status = error.status_code(),
                        error = %error,
                        "Prediction request failed"
                    );
                    break failure(error);
                }
                RetryMode::RetryUntilSuccess => {
                    tracing::warn!(
                        job_id,
                        attempt = attempts,
                        status = error.status_code(),
                        error = %error,
                        "Prediction attempt failed, retrying"
                    );
                    // No backoff, but let sibling jobs and timers run between attempts.
                    tokio::task::yield_now().await;
                }
            }
        };

        let elapsed = started.elapsed();
        let end_time = start_time
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());

        let label = if outcome.is_success() { "success" } else { "failure" };
        metrics::counter!("predict_jobs_total", "outcome" => label).increment(1);
        metrics::histogram!("predict_job_seconds").record(elapsed.as_secs_f64());

        tracing::debug!(
            job_id,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            outcome = label,
            "Job finished"
        );

        JobResult {
            job: Job {
                job_id,
                start_time,
                end_time,
                attempts,
            },
            outcome,
        }
    }
}

fn failure(error: PredictError) -> Outcome {
    Outcome::Failure {
        kind: error.kind(),
        message: error.to_string(),
    }
}

fn cancelled(job_id: usize, attempts: u32) -> Outcome {
    tracing::warn!(job_id, attempts, "Job cancelled before completion");
    Outcome::Failure {
        kind: FailureKind::Cancelled,
        message: format!("cancelled after {attempts} attempt(s)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults_per_mode() {
        assert_eq!(
            RetryPolicy::fail_fast().missing_fields,
            MissingFieldPolicy::Tolerate
        );
        assert_eq!(
            RetryPolicy::retry_until_success().missing_fields,
            MissingFieldPolicy::Reject
        );
    }

    #[test]
    fn test_policy_from_config_honours_override() {
        let config = HarnessConfig {
            retry_mode: RetryMode::RetryUntilSuccess,
            missing_fields: Some(MissingFieldPolicy::Tolerate),
            ..Default::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.mode, RetryMode::RetryUntilSuccess);
        assert_eq!(policy.missing_fields, MissingFieldPolicy::Tolerate);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let (handle, cancellation) = crate::services::cancel::cancellation();
        handle.cancel();

        let client = PredictClient::new(
            "http://127.0.0.1:9/predict",
            std::time::Duration::from_secs(1),
        )
        .unwrap();
        let payload = Arc::new(crate::services::payload::encode_payload(b"x"));
        let executor = Executor::new(
            client,
            payload,
            RetryPolicy::retry_until_success(),
            cancellation,
        );

        let result = executor.execute(7).await;
        assert_eq!(result.job.job_id, 7);
        assert_eq!(result.job.attempts, 0);
        assert_eq!(result.outcome.failure_kind(), Some(FailureKind::Cancelled));
        assert!(result.job.end_time >= result.job.start_time);
    }
}
