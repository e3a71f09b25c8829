use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// One dispatched request and its timing.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Network attempts made, including the successful one.
    pub attempts: u32,
}

impl Job {
    /// Seconds between `start_time` and `end_time`.
    pub fn elapsed_secs(&self) -> f64 {
        (self.end_time - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Label returned by the predict endpoint.
///
/// Both fields are only `None` when the missing-field policy tolerates an
/// incomplete success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub predicted_label: Option<i64>,
    #[serde(default)]
    pub predicted_class: Option<String>,
}

impl Prediction {
    pub fn is_complete(&self) -> bool {
        self.predicted_label.is_some() && self.predicted_class.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, timeout, DNS, or a broken response stream
    Transport,
    /// Non-200 status
    Status,
    /// 200 with a body that is not the expected JSON shape
    MalformedBody,
    /// 200 without `predicted_label` or `predicted_class`
    MissingField,
    /// The run was cancelled before the job reached another terminal state
    Cancelled,
}

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Prediction),
    Failure { kind: FailureKind, message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            Outcome::Success(prediction) => Some(prediction),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// A finished job. Never mutated after the executor returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job: Job,
    pub outcome: Outcome,
}
