mod detail;
mod log;
mod render;
mod sections;

pub use detail::{DetailSource, EvidenceDetails};
pub use log::{LogEntry, ResearchLog};
pub use render::render_markdown;
pub use sections::{
    display_title, ReportDocument, ReportPatch, ReportReducer, Section, SectionStatus,
};
