//! Mock predict endpoint for integration tests

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use predict_loadtest::services::payload::decode_payload;
use predict_loadtest::services::predict::JOB_ID_HEADER;

pub const TIGER_CAT: &str = r#"{"predicted_label": 3, "predicted_class": "tiger cat"}"#;

/// How the mock answers each request.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Same status and body for every request
    Always { status: StatusCode, body: String },
    /// 500 for the first `failures` attempts of each job id, then `TIGER_CAT`
    FailThenSucceed { failures: u32 },
}

impl Behavior {
    pub fn ok(body: &str) -> Self {
        Behavior::Always {
            status: StatusCode::OK,
            body: body.to_string(),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Behavior::Always {
            status,
            body: "internal error".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct MockState {
    behavior: Behavior,
    delay: Duration,
    expected_image: Option<Vec<u8>>,
    pub requests: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    attempts: Mutex<HashMap<usize, u32>>,
    pub received: Mutex<Vec<Vec<u8>>>,
}

impl MockState {
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub struct MockPredictServer {
    pub url: String,
    pub state: Arc<MockState>,
}

pub struct MockBuilder {
    behavior: Behavior,
    delay: Duration,
    expected_image: Option<Vec<u8>>,
}

impl MockPredictServer {
    pub fn builder(behavior: Behavior) -> MockBuilder {
        MockBuilder {
            behavior,
            delay: Duration::ZERO,
            expected_image: None,
        }
    }

    pub async fn start(behavior: Behavior) -> Self {
        Self::builder(behavior).start().await
    }
}

impl MockBuilder {
    /// Sleep this long inside every request
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer 400 unless the decoded payload equals `image`
    pub fn expect_image(mut self, image: &[u8]) -> Self {
        self.expected_image = Some(image.to_vec());
        self
    }

    pub async fn start(self) -> MockPredictServer {
        let state = Arc::new(MockState {
            behavior: self.behavior,
            delay: self.delay,
            expected_image: self.expected_image,
            requests: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            attempts: Mutex::new(HashMap::new()),
            received: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/predict", post(predict))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockPredictServer {
            url: format!("http://{}/predict", addr),
            state,
        }
    }
}

async fn predict(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now, Ordering::SeqCst);

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    let response = respond(&state, &headers, &body);
    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

fn respond(state: &MockState, headers: &HeaderMap, body: &str) -> (StatusCode, String) {
    let image = match decode_payload(body) {
        Ok(image) => image,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()),
    };
    if let Some(expected) = &state.expected_image {
        if &image != expected {
            return (StatusCode::BAD_REQUEST, "payload mismatch".to_string());
        }
    }
    state.received.lock().unwrap().push(image);

    match &state.behavior {
        Behavior::Always { status, body } => (*status, body.clone()),
        Behavior::FailThenSucceed { failures } => {
            let job_id: usize = headers
                .get(JOB_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(usize::MAX);

            let mut attempts = state.attempts.lock().unwrap();
            let seen = attempts.entry(job_id).or_insert(0);
            *seen += 1;

            if *seen <= *failures {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("attempt {} failed", seen))
            } else {
                (StatusCode::OK, TIGER_CAT.to_string())
            }
        }
    }
}

/// An address nothing is listening on.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/predict", addr)
}
