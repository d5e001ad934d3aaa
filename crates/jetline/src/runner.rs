use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::consumer::StreamConsumer;
use crate::error::{StreamError, StreamResult};
use crate::lines::LineBuffer;
use crate::policy::{AttemptOutcome, PolicyAction, ReconnectPolicy, StatusClass};

/// Options for a [`StreamRunner`], fixed at construction.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Reconnect after stream end and retryable failures. When false the
    /// loop performs exactly one connection attempt and stops regardless of
    /// outcome.
    pub auto_reconnect: bool,
    /// Backoff behaviour for failed attempts.
    pub policy: ReconnectPolicy,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            policy: ReconnectPolicy::default(),
        }
    }
}

/// State reachable from both the owner and the background task.
struct Shared {
    /// Last URL handed to the HTTP client, kept for diagnostics.
    url: Mutex<Option<String>>,
    /// Release handle for the in-flight response. Firing it makes a blocked
    /// read return promptly; armed only while a body is being read.
    current: Mutex<Option<oneshot::Sender<()>>>,
    /// Set by `kill()`; observed at every suspension point of the loop.
    shutdown: CancellationToken,
}

impl Shared {
    // Idempotent: the sender is taken under the lock, so a concurrent
    // release observes None.
    fn release_current(&self) {
        if let Some(release) = self.current.lock().take() {
            let _ = release.send(());
        }
    }
}

/// Runs the connect/read/backoff loop for one newline-delimited stream.
///
/// The loop executes on a dedicated tokio task spawned by [`start`]; the
/// owner can wait for it with [`join`] or cancel it with [`kill`]. All
/// progress is reported through the consumer's callbacks, in event order.
///
/// [`start`]: StreamRunner::start
/// [`join`]: StreamRunner::join
/// [`kill`]: StreamRunner::kill
pub struct StreamRunner {
    consumer: Arc<dyn StreamConsumer>,
    http: Client,
    options: RunnerOptions,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
    outcome: Option<bool>,
}

impl StreamRunner {
    /// Creates a runner with default options and a fresh HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Client`] if the client cannot be built.
    pub fn new(consumer: Arc<dyn StreamConsumer>) -> StreamResult<Self> {
        Self::with_options(consumer, RunnerOptions::default())
    }

    /// Creates a runner with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Client`] if the client cannot be built.
    pub fn with_options(
        consumer: Arc<dyn StreamConsumer>,
        options: RunnerOptions,
    ) -> StreamResult<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(StreamError::client)?;
        Ok(Self::with_client(consumer, http, options))
    }

    /// Creates a runner reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(
        consumer: Arc<dyn StreamConsumer>,
        http: Client,
        options: RunnerOptions,
    ) -> Self {
        Self {
            consumer,
            http,
            options,
            shared: Arc::new(Shared {
                url: Mutex::new(None),
                current: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
            task: None,
            outcome: None,
        }
    }

    /// Last URL the loop attempted, for diagnostics.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.shared.url.lock().clone()
    }

    /// Spawns the reconnect loop on a background task.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AlreadyStarted`] on a second call.
    pub fn start(&mut self) -> StreamResult<()> {
        if self.task.is_some() || self.outcome.is_some() {
            return Err(StreamError::AlreadyStarted);
        }
        let run = RunnerLoop {
            consumer: Arc::clone(&self.consumer),
            http: self.http.clone(),
            options: self.options.clone(),
            shared: Arc::clone(&self.shared),
        };
        self.task = Some(tokio::spawn(run.run()));
        Ok(())
    }

    /// Waits for the loop task to finish.
    ///
    /// Returns `Ok(true)` iff the task completed without fault. An elapsed
    /// timeout reports `Ok(false)` and leaves the task joinable; a task
    /// aborted by [`kill`](Self::kill) reports `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NotStarted`] before [`start`](Self::start).
    pub async fn join(&mut self, timeout: Option<Duration>) -> StreamResult<bool> {
        if let Some(done) = self.outcome {
            return Ok(done);
        }
        let Some(mut task) = self.task.take() else {
            return Err(StreamError::NotStarted);
        };

        let finished = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(result) => Some(result.is_ok()),
                Err(_) => None,
            },
            None => Some((&mut task).await.is_ok()),
        };

        match finished {
            Some(done) => {
                self.outcome = Some(done);
                Ok(done)
            }
            None => {
                self.task = Some(task);
                Ok(false)
            }
        }
    }

    /// Releases the in-flight response, if one is open.
    ///
    /// Safe to call from any task at any time; the second call is a no-op.
    /// The loop treats the release like end of stream, so it reconnects if
    /// `auto_reconnect` is set and the owner still wants the stream.
    pub fn close(&self) {
        self.shared.release_current();
    }

    /// Cancels the loop and aborts any blocked read.
    ///
    /// May be called concurrently with the loop running. The cancellation
    /// itself produces no `on_error` or `on_disconnect`; the connection is
    /// released before the task ends.
    pub fn kill(&self) {
        self.shared.shutdown.cancel();
        self.shared.release_current();
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Result of one connection attempt, before the policy sees it.
enum Attempt {
    /// HTTP 200; the body is ready for consumption.
    Stream(Box<reqwest::Response>),
    /// Anything else, already classified.
    Outcome(AttemptOutcome),
}

/// The reconnect loop, owned by the background task.
struct RunnerLoop {
    consumer: Arc<dyn StreamConsumer>,
    http: Client,
    options: RunnerOptions,
    shared: Arc<Shared>,
}

impl RunnerLoop {
    async fn run(self) {
        let mut delay_secs: u64 = 0;
        let mut first_attempt = true;

        while (first_attempt || self.options.auto_reconnect) && self.consumer.wants_stream() {
            first_attempt = false;

            if delay_secs > 0 {
                tokio::select! {
                    biased;
                    () = self.shared.shutdown.cancelled() => break,
                    () = sleep(Duration::from_secs(delay_secs)) => {}
                }
            }

            let (outcome, response) = match self.connect().await {
                Attempt::Stream(response) => (AttemptOutcome::Connected, Some(response)),
                Attempt::Outcome(outcome) => (outcome, None),
            };

            let decision = self.options.policy.decide(delay_secs, &outcome);
            delay_secs = decision.next_delay_secs;
            if !self.notify(&decision.action) {
                break;
            }

            // Present exactly when the policy said ConsumeStream.
            if let Some(response) = response {
                self.consumer.on_connect();
                if let Err(message) = self.consume_stream(*response).await {
                    // Mid-read failures take the same backoff branch as a
                    // failed request, stepping from the reset delay.
                    let retry = self
                        .options
                        .policy
                        .decide(delay_secs, &AttemptOutcome::TransportFailure { message });
                    delay_secs = retry.next_delay_secs;
                    if !self.notify(&retry.action) {
                        break;
                    }
                }
                debug!(
                    running = self.consumer.wants_stream(),
                    "stream closed, may restart"
                );
            }
        }

        self.consumer.on_disconnect();
    }

    /// Emits the decision's notification. Returns false when the loop must
    /// stop.
    fn notify(&self, action: &PolicyAction) -> bool {
        match action {
            PolicyAction::ConsumeStream => true,
            PolicyAction::RetryAfterDelay { warning } => {
                self.consumer.on_warning(warning);
                true
            }
            PolicyAction::Terminate { error } => {
                self.consumer.on_error(error);
                false
            }
        }
    }

    /// Issues one GET and classifies the result. Terminal 4xx responses
    /// drain the body here so the policy can extract the error message.
    async fn connect(&self) -> Attempt {
        let url = self.consumer.url();
        *self.shared.url.lock() = Some(url.clone());
        debug!(%url, "connecting");

        let request = self
            .http
            .get(&url)
            .header("Auth", self.consumer.auth_header())
            .header("User-Agent", self.consumer.user_agent());

        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                return Attempt::Outcome(AttemptOutcome::TransportFailure {
                    message: error.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        debug!(%url, status, "response received");

        match StatusClass::of(status) {
            StatusClass::Ok => Attempt::Stream(Box::new(response)),
            StatusClass::Terminal => {
                let body = response.text().await.unwrap_or_default();
                Attempt::Outcome(AttemptOutcome::ClientError { status, body })
            }
            StatusClass::Retryable => Attempt::Outcome(AttemptOutcome::ServerBusy { status }),
        }
    }

    /// Reads the body line by line until end of stream, owner stop,
    /// cancellation, or an explicit release. A mid-read transport error is
    /// returned for the backoff branch. Every exit path disarms the release
    /// handle and drops the response, closing the connection.
    async fn consume_stream(&self, response: reqwest::Response) -> Result<(), String> {
        let (release, mut released) = oneshot::channel();
        *self.shared.current.lock() = Some(release);

        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::new();
        let mut result = Ok(());

        'read: loop {
            let chunk = tokio::select! {
                biased;
                () = self.shared.shutdown.cancelled() => break 'read,
                _ = &mut released => break 'read,
                chunk = body.next() => chunk,
            };

            match chunk {
                Some(Ok(data)) => {
                    for line in lines.push(&data) {
                        if !self.consumer.is_active() {
                            break 'read;
                        }
                        if !line.is_empty() {
                            self.consumer.on_data(line);
                        }
                    }
                }
                Some(Err(error)) => {
                    result = Err(error.to_string());
                    break 'read;
                }
                None => {
                    if let Some(tail) = lines.take_remainder() {
                        if self.consumer.is_active() {
                            self.consumer.on_data(tail);
                        }
                    }
                    break 'read;
                }
            }
        }

        self.shared.release_current();
        result
    }
}
