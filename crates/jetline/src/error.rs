use thiserror::Error;

/// Centralized error type for jetline.
///
/// Failures inside the reconnect loop never surface here; the policy absorbs
/// them and reports through the consumer's warning/error callbacks. Only
/// misuse of the control surface and client construction can fail.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream task already started")]
    AlreadyStarted,
    #[error("stream task not started")]
    NotStarted,
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl StreamError {
    /// Creates a client construction error from a reqwest error.
    pub fn client(error: reqwest::Error) -> Self {
        Self::Client(error.to_string())
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
