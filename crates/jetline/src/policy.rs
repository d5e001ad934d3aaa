use serde_json::Value;

/// Coarse classification of an HTTP status code on the stream endpoint.
///
/// Success is exactly 200. Client errors are terminal, except 420 which the
/// server uses as a rate-limit signal and is retried like an overload.
/// Everything else (5xx, 1xx, 3xx) is ambiguous and retried with backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Ok,
    Terminal,
    Retryable,
}

impl StatusClass {
    #[must_use]
    pub fn of(status: u16) -> Self {
        match status {
            200 => Self::Ok,
            420 => Self::Retryable,
            400..=499 => Self::Terminal,
            _ => Self::Retryable,
        }
    }
}

/// Classified result of a single connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// HTTP 200, body ready for line-by-line consumption.
    Connected,
    /// Terminal 4xx, carrying the full response body for message extraction.
    ClientError { status: u16, body: String },
    /// Retryable status: 5xx, 420, or anything else unexpected.
    ServerBusy { status: u16 },
    /// Transport-level failure: DNS, connect, timeout, or a mid-read error.
    TransportFailure { message: String },
}

/// What the runner should do after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAction {
    /// Read the stream line by line.
    ConsumeStream,
    /// Sleep for the decided delay, warn the owner, then try again.
    RetryAfterDelay { warning: String },
    /// Report the terminal message and stop the loop.
    Terminate { error: String },
}

/// A decision together with the delay state for the next iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: PolicyAction,
    pub next_delay_secs: u64,
}

/// Pure reconnect decision logic.
///
/// Maps (current delay, attempt outcome) to a [`Decision`]. Performs no I/O;
/// the runner applies the delay and emits the notifications. The delay state
/// is a single integer number of seconds, starting at 0, reset to 0 by any
/// successful attempt.
///
/// Server-side failures back off exponentially from `initial_backoff_secs`
/// up to `max_backoff_secs`, then give up. Transport failures back off
/// linearly, one second per attempt, giving up once the delay reaches
/// `transport_cap_secs`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub transport_cap_secs: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_secs: 10,
            max_backoff_secs: 320,
            transport_cap_secs: 16,
        }
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub fn decide(&self, delay_secs: u64, outcome: &AttemptOutcome) -> Decision {
        match outcome {
            AttemptOutcome::Connected => Decision {
                action: PolicyAction::ConsumeStream,
                next_delay_secs: 0,
            },
            AttemptOutcome::ClientError { status, body } => Decision {
                action: PolicyAction::Terminate {
                    error: client_error_message(*status, body),
                },
                next_delay_secs: delay_secs,
            },
            AttemptOutcome::ServerBusy { status } => {
                let next = if delay_secs == 0 {
                    self.initial_backoff_secs
                } else if delay_secs < self.max_backoff_secs {
                    delay_secs * 2
                } else {
                    return Decision {
                        action: PolicyAction::Terminate {
                            error: format!("Received {status} response, no more retries"),
                        },
                        next_delay_secs: delay_secs,
                    };
                };
                Decision {
                    action: PolicyAction::RetryAfterDelay {
                        warning: format!("Received {status} response, retrying in {next} seconds"),
                    },
                    next_delay_secs: next,
                }
            }
            AttemptOutcome::TransportFailure { message } => {
                if delay_secs < self.transport_cap_secs {
                    let next = delay_secs + 1;
                    Decision {
                        action: PolicyAction::RetryAfterDelay {
                            warning: format!(
                                "Connection failed ({message}), retrying in {next} seconds"
                            ),
                        },
                        next_delay_secs: next,
                    }
                } else {
                    Decision {
                        action: PolicyAction::Terminate {
                            error: format!("Connection failed ({message}), no more retries"),
                        },
                        next_delay_secs: delay_secs,
                    }
                }
            }
        }
    }
}

/// Best-effort extraction of a human-readable message from a terminal
/// 4xx body. The server sends `{"message": "..."}` on known failures.
fn client_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("message") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => "Hash not found".to_string(),
        },
        Err(_) => format!("Connection failed: {status} [no error message]"),
    }
}
