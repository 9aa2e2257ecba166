use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frame::{payload_text, RawEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub filename: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub score: f64,
}

/// Anything other than `stop` keeps the research loop going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum DecisionKind {
    Continue,
    Stop,
}

impl From<String> for DecisionKind {
    fn from(raw: String) -> Self {
        if raw.trim().eq_ignore_ascii_case("stop") {
            DecisionKind::Stop
        } else {
            DecisionKind::Continue
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum DecisionSource {
    Ai,
    Rule,
}

impl From<String> for DecisionSource {
    fn from(raw: String) -> Self {
        if raw.trim().eq_ignore_ascii_case("ai") {
            DecisionSource::Ai
        } else {
            DecisionSource::Rule
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionMetrics {
    #[serde(default)]
    pub total_quality: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub richness: f64,
    #[serde(default)]
    pub dedup: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchDecision {
    #[serde(default)]
    pub round: u32,
    pub decision: DecisionKind,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_source")]
    pub source: DecisionSource,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub metrics: DecisionMetrics,
}

fn default_source() -> DecisionSource {
    DecisionSource::Rule
}

/// Report protocol event. Frames are `{type, payload}`; the payload shape
/// depends on the tag, so decoding dispatches on the tag first.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Toc(Vec<String>),
    StepStart { index: usize, title: Option<String> },
    Chunk(String),
    StepDone { index: usize },
    Done,
    Error(String),
    Thought(String),
    RagSearch { query: String },
    RagResult(Evidence),
    TakeNote(String),
    ResearchDecision(ResearchDecision),
    Unknown(String),
}

impl ReportEvent {
    pub fn from_raw(raw: &RawEvent) -> Result<Self, serde_json::Error> {
        let payload = raw.payload();
        let event = match raw.kind() {
            "toc" | "toc_generated" => ReportEvent::Toc(parse_toc(payload)?),
            "step_start" => {
                let start = StepStartPayload::deserialize(payload)?;
                ReportEvent::StepStart {
                    index: start.index,
                    title: start.title,
                }
            }
            "report_chunk" | "step_stream" => ReportEvent::Chunk(parse_chunk(payload)?),
            "step_done" => ReportEvent::StepDone {
                index: IndexPayload::deserialize(payload)?.index,
            },
            "done" => ReportEvent::Done,
            "error" => ReportEvent::Error(payload_text(payload)),
            "thought" | "planning" => ReportEvent::Thought(payload_text(payload)),
            "rag_search" => ReportEvent::RagSearch {
                query: QueryPayload::deserialize(payload)?.query,
            },
            "rag_result" => ReportEvent::RagResult(Evidence::deserialize(payload)?),
            "take_note" => ReportEvent::TakeNote(NotePayload::deserialize(payload)?.content),
            "research_decision" => {
                ReportEvent::ResearchDecision(ResearchDecision::deserialize(payload)?)
            }
            other => ReportEvent::Unknown(other.to_string()),
        };
        Ok(event)
    }

    /// True for events only the extended profile consumes.
    pub fn is_research(&self) -> bool {
        matches!(
            self,
            ReportEvent::Thought(_)
                | ReportEvent::RagSearch { .. }
                | ReportEvent::RagResult(_)
                | ReportEvent::TakeNote(_)
                | ReportEvent::ResearchDecision(_)
        )
    }
}

#[derive(Deserialize)]
struct StepStartPayload {
    index: usize,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct IndexPayload {
    index: usize,
}

#[derive(Deserialize)]
struct QueryPayload {
    #[serde(default)]
    query: String,
}

#[derive(Deserialize)]
struct NotePayload {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TocPayload {
    Titles(Vec<String>),
    Steps { steps: Vec<String> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChunkPayload {
    Text(String),
    Wrapped { chunk: String },
}

fn parse_toc(payload: &Value) -> Result<Vec<String>, serde_json::Error> {
    Ok(match TocPayload::deserialize(payload)? {
        TocPayload::Titles(titles) | TocPayload::Steps { steps: titles } => titles,
    })
}

fn parse_chunk(payload: &Value) -> Result<String, serde_json::Error> {
    Ok(match ChunkPayload::deserialize(payload)? {
        ChunkPayload::Text(text) | ChunkPayload::Wrapped { chunk: text } => text,
    })
}
