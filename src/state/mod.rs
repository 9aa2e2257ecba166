pub mod audit;
pub mod chat;
pub mod report;
mod terminal;

pub use audit::{AuditDocument, AuditPatch, AuditReducer, StepCard, StepStatus};
pub use chat::{ChatPatch, ChatReducer, ChatTranscript};
pub use report::{ReportDocument, ReportPatch, ReportReducer};
pub use terminal::Terminal;
