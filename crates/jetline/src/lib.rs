//! Reconnecting client for newline-delimited HTTP event streams.
//!
//! A [`StreamRunner`] holds one persistent GET open against a server that
//! emits one JSON-capable payload per line, delivering each line to a
//! caller-supplied [`StreamConsumer`]. Transient failures are retried with
//! backoff decided by a pure [`ReconnectPolicy`]; terminal client errors and
//! exhausted retries stop the loop and are reported through the consumer's
//! notification callbacks.

#![forbid(unsafe_code)]

mod consumer;
mod error;
mod lines;
mod policy;
mod runner;

pub use crate::{
    consumer::StreamConsumer,
    error::{StreamError, StreamResult},
    lines::LineBuffer,
    policy::{AttemptOutcome, Decision, PolicyAction, ReconnectPolicy, StatusClass},
    runner::{RunnerOptions, StreamRunner},
};
