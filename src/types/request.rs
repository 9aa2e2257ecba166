use serde::Serialize;
use serde_json::Value;

use crate::api::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportProfile {
    #[default]
    Standard,
    /// Also consumes the research trail (thoughts, searches, evidence, notes, decisions).
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Audit,
    Chat,
    Report(ReportProfile),
}

impl Workflow {
    /// Path of the streaming endpoint, relative to the backend base URL.
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            Workflow::Audit => "analyze",
            Workflow::Chat => "chat",
            Workflow::Report(_) => "generate_report",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Workflow::Audit => "audit",
            Workflow::Chat => "chat",
            Workflow::Report(ReportProfile::Standard) => "report",
            Workflow::Report(ReportProfile::Extended) => "report-extended",
        }
    }
}

#[derive(Debug, Serialize)]
struct AuditBody<'a> {
    raw_data: &'a str,
    language: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    message: &'a str,
    session_id: &'a str,
    language: &'a str,
}

/// A workflow plus the JSON body POSTed to start it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRequest {
    workflow: Workflow,
    body: Value,
}

impl WorkflowRequest {
    pub fn audit(raw_data: &str, language: &str) -> Result<Self, StreamError> {
        if raw_data.trim().is_empty() {
            return Err(StreamError::InvalidRequest(
                "audit input must not be empty".to_string(),
            ));
        }
        Self::build(Workflow::Audit, &AuditBody { raw_data, language })
    }

    pub fn chat(message: &str, session_id: &str, language: &str) -> Result<Self, StreamError> {
        if message.trim().is_empty() {
            return Err(StreamError::InvalidRequest(
                "chat message must not be empty".to_string(),
            ));
        }
        Self::build(
            Workflow::Chat,
            &ChatBody {
                message: message.trim(),
                session_id,
                language,
            },
        )
    }

    pub fn report(
        raw_data: &str,
        language: &str,
        profile: ReportProfile,
    ) -> Result<Self, StreamError> {
        if raw_data.trim().is_empty() {
            return Err(StreamError::InvalidRequest(
                "report context must not be empty".to_string(),
            ));
        }
        Self::build(Workflow::Report(profile), &AuditBody { raw_data, language })
    }

    fn build<B: Serialize>(workflow: Workflow, body: &B) -> Result<Self, StreamError> {
        let body = serde_json::to_value(body)
            .map_err(|e| StreamError::InvalidRequest(e.to_string()))?;
        Ok(Self { workflow, body })
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}
