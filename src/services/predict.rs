use reqwest::{header, Client, StatusCode};
use std::time::Duration;

use crate::config::MissingFieldPolicy;
use crate::models::job::{FailureKind, Prediction};
use crate::services::payload::EncodedPayload;

/// Header carrying the job id, for correlating requests on the server side.
pub const JOB_ID_HEADER: &str = "x-loadtest-job-id";

/// Shared handle to the predict endpoint.
///
/// Cloning is cheap: clones share one connection pool.
#[derive(Debug, Clone)]
pub struct PredictClient {
    http: Client,
    url: String,
}

impl PredictClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PredictError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("predict-loadtest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PredictError::Transport)?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one prediction request and classify the response.
    pub async fn predict(
        &self,
        job_id: usize,
        payload: &EncodedPayload,
        missing_fields: MissingFieldPolicy,
    ) -> Result<Prediction, PredictError> {
        let response = self
            .http
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(JOB_ID_HEADER, job_id)
            .body(payload.body().to_owned())
            .send()
            .await
            .map_err(PredictError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(PredictError::Transport)?;

        if status != StatusCode::OK {
            return Err(PredictError::Status { status, body });
        }

        let prediction = parse_prediction(&body)?;

        if !prediction.is_complete() && missing_fields == MissingFieldPolicy::Reject {
            return Err(PredictError::MissingField(body));
        }

        Ok(prediction)
    }
}

/// Parse a success body. Only a JSON object is accepted; serde's derived
/// struct impl would also take a positional array.
fn parse_prediction(body: &str) -> Result<Prediction, PredictError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(PredictError::NotAnObject(body.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Predict endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to parse predict response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Predict response is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("Predict response is missing predicted_label or predicted_class: {0}")]
    MissingField(String),
}

impl PredictError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PredictError::Transport(_) => FailureKind::Transport,
            PredictError::Status { .. } => FailureKind::Status,
            PredictError::Parse(_) | PredictError::NotAnObject(_) => FailureKind::MalformedBody,
            PredictError::MissingField(_) => FailureKind::MissingField,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            PredictError::Status { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_object() {
        let prediction =
            parse_prediction(r#"{"predicted_label": 3, "predicted_class": "tiger cat"}"#).unwrap();
        assert_eq!(prediction.predicted_label, Some(3));
        assert_eq!(prediction.predicted_class.as_deref(), Some("tiger cat"));
    }

    #[test]
    fn test_parse_rejects_arrays_and_scalars() {
        for body in [r#"[3, "tiger cat"]"#, "[]", "3", r#""tiger cat""#, "null"] {
            let err = parse_prediction(body).unwrap_err();
            assert_eq!(err.kind(), FailureKind::MalformedBody, "body {body}");
        }
    }

    #[test]
    fn test_parse_wrong_field_type_is_malformed() {
        let err = parse_prediction(r#"{"predicted_label": "three"}"#).unwrap_err();
        assert!(matches!(err, PredictError::Parse(_)));
    }

    #[test]
    fn test_parse_empty_object_is_incomplete() {
        let prediction = parse_prediction("{}").unwrap();
        assert!(!prediction.is_complete());
    }
}
