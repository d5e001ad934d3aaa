//! Shared test infrastructure for jetline.

#![forbid(unsafe_code)]

mod http_server;
mod script;

pub use crate::{
    http_server::TestHttpServer,
    script::{CannedResponse, ResponseScript},
};
