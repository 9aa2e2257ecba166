pub mod audit;
pub mod chat;
pub mod frame;
pub mod report;
pub mod request;

pub use audit::{AuditEvent, CardId, StepInfo};
pub use chat::{ChatEvent, DisplayConfig};
pub use frame::{payload_text, RawEvent};
pub use report::{
    DecisionKind, DecisionMetrics, DecisionSource, Evidence, ReportEvent, ResearchDecision,
};
pub use request::{ReportProfile, Workflow, WorkflowRequest};
