use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// One scripted response.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub body: String,
}

impl CannedResponse {
    /// # Panics
    ///
    /// Panics if `status` is not a valid HTTP status code.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status code"),
            body: body.into(),
        }
    }
}

/// Serves a fixed sequence of canned responses, then repeats the last one.
///
/// Clones share the cursor, so a clone can be moved into an axum handler
/// while the test keeps its own handle for [`served`](Self::served).
#[derive(Debug, Clone)]
pub struct ResponseScript {
    steps: Arc<Vec<CannedResponse>>,
    cursor: Arc<AtomicUsize>,
}

impl ResponseScript {
    /// # Panics
    ///
    /// Panics if `steps` is empty.
    #[must_use]
    pub fn new(steps: Vec<CannedResponse>) -> Self {
        assert!(!steps.is_empty(), "response script needs at least one step");
        Self {
            steps: Arc::new(steps),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Next response in the script.
    pub fn next_response(&self) -> Response {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .get(index)
            .unwrap_or_else(|| self.steps.last().expect("script is non-empty"));
        (step.status, step.body.clone()).into_response()
    }

    /// How many requests the script has answered.
    #[must_use]
    pub fn served(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}
