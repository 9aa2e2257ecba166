use serde::Serialize;

use crate::api::StreamError;
use crate::config::ViolationPolicy;

/// How a stream ended. Every stream reaches exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum Terminal {
    Success,
    /// Backend-reported or transport failure, with a readable message.
    Error(String),
    /// Cancelled by the user or replaced by a newer stream on the same session.
    Interrupted,
}

impl Terminal {
    pub fn is_success(&self) -> bool {
        matches!(self, Terminal::Success)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Terminal::Interrupted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Terminal::Success => "success",
            Terminal::Error(_) => "error",
            Terminal::Interrupted => "interrupted",
        }
    }
}

impl From<&StreamError> for Terminal {
    fn from(error: &StreamError) -> Self {
        if error.is_cancelled() {
            Terminal::Interrupted
        } else {
            Terminal::Error(error.to_string())
        }
    }
}

/// Logs an event that contradicts what the stream established so far. Under
/// [`ViolationPolicy::Fail`] it also ends the stream.
pub(crate) fn protocol_violation(
    policy: ViolationPolicy,
    workflow: &'static str,
    detail: String,
) -> Option<Terminal> {
    tracing::warn!(workflow, %detail, "protocol violation");
    match policy {
        ViolationPolicy::Ignore => None,
        ViolationPolicy::Fail => Some(Terminal::Error(format!("protocol violation: {detail}"))),
    }
}
