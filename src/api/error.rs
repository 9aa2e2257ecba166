use std::time::Duration;
use thiserror::Error;

use crate::util::is_local_endpoint_url;

/// Failures that end an [`EventStream`](super::EventStream). Malformed frames are not
/// errors: the decoder drops them and keeps going.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("cannot reach endpoint '{url}': {message}")]
    Connect { url: String, message: String },
    #[error("endpoint '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("request to '{url}' timed out")]
    Timeout { url: String },
    #[error("reading stream from '{url}' failed: {message}")]
    Read { url: String, message: String },
    #[error("no data received for {0:?}")]
    Idle(Duration),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("stream cancelled")]
    Cancelled,
}

impl StreamError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }
}

pub fn map_transport_error(error: reqwest::Error, url: &str) -> StreamError {
    if error.is_connect() && is_local_endpoint_url(url) {
        return StreamError::Connect {
            url: url.to_string(),
            message: format!("{error}. Start the local backend or update LIVEDOC_BASE_URL."),
        };
    }
    if error.is_connect() {
        return StreamError::Connect {
            url: url.to_string(),
            message: error.to_string(),
        };
    }
    if error.is_timeout() {
        return StreamError::Timeout {
            url: url.to_string(),
        };
    }
    if let Some(status) = error.status() {
        return StreamError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        };
    }
    StreamError::Read {
        url: url.to_string(),
        message: error.to_string(),
    }
}
