use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use super::log::{LogEntry, ResearchLog};
use super::render::render_markdown;
use crate::config::ViolationPolicy;
use crate::runtime::Reducer;
use crate::state::terminal::{protocol_violation, Terminal};
use crate::types::{RawEvent, ReportEvent, ReportProfile};

const WORKFLOW: &str = "report";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Pending,
    Active,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub index: usize,
    /// Title as listed in the table of contents.
    pub title: String,
    /// Heading shown for the section body, from `step_start` when it carries one.
    pub heading: String,
    pub raw: String,
    pub status: SectionStatus,
}

impl Section {
    pub fn rendered(&self) -> String {
        render_markdown(&self.raw)
    }
}

/// Strips `N. ` numbering and `**` emphasis from a TOC entry.
pub fn display_title(title: &str) -> String {
    static NUMBERING: OnceLock<Option<Regex>> = OnceLock::new();
    let stripped = match NUMBERING.get_or_init(|| Regex::new(r"^\d+\.\s*").ok()) {
        Some(numbering) => numbering.replace(title, ""),
        None => title.into(),
    };
    stripped.replace("**", "")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportDocument {
    pub sections: Vec<Section>,
    pub log: ResearchLog,
}

impl ReportDocument {
    pub fn active_section(&self) -> Option<&Section> {
        self.sections
            .iter()
            .find(|section| section.status == SectionStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "patch", rename_all = "snake_case")]
pub enum ReportPatch {
    TocSet {
        titles: Vec<String>,
    },
    SectionActivated {
        index: usize,
        heading: String,
    },
    /// `html` is the re-render of the whole section buffer after `delta`.
    SectionAppended {
        index: usize,
        delta: String,
        html: String,
    },
    SectionCompleted {
        index: usize,
    },
    LogAppended {
        entry: LogEntry,
    },
}

/// Folds the report stream into a fixed table of sections plus, for the
/// extended profile, the research log.
#[derive(Debug, Default)]
pub struct ReportReducer {
    profile: ReportProfile,
    policy: ViolationPolicy,
    document: ReportDocument,
    toc_received: bool,
    active: Option<usize>,
    /// Highest index activated so far; activations must not go below it.
    last_started: Option<usize>,
}

impl ReportReducer {
    pub fn new(profile: ReportProfile, policy: ViolationPolicy) -> Self {
        Self {
            profile,
            policy,
            ..Self::default()
        }
    }

    pub fn profile(&self) -> ReportProfile {
        self.profile
    }

    pub fn document(&self) -> &ReportDocument {
        &self.document
    }

    pub fn into_document(self) -> ReportDocument {
        self.document
    }

    fn violation(&self, detail: String) -> Option<Terminal> {
        protocol_violation(self.policy, WORKFLOW, detail)
    }

    fn set_toc(&mut self, titles: Vec<String>, patches: &mut Vec<ReportPatch>) -> Option<Terminal> {
        if self.toc_received {
            return self.violation("table of contents received twice".to_string());
        }
        self.toc_received = true;
        self.document.sections = titles
            .into_iter()
            .enumerate()
            .map(|(index, title)| Section {
                index,
                heading: display_title(&title),
                title,
                raw: String::new(),
                status: SectionStatus::Pending,
            })
            .collect();

        patches.push(ReportPatch::TocSet {
            titles: self
                .document
                .sections
                .iter()
                .map(|section| section.heading.clone())
                .collect(),
        });
        None
    }

    fn start_section(
        &mut self,
        index: usize,
        title: Option<String>,
        patches: &mut Vec<ReportPatch>,
    ) -> Option<Terminal> {
        if !self.toc_received {
            return self.violation(format!("section {index} started before the table of contents"));
        }
        let Some(section) = self.document.sections.get(index) else {
            return self.violation(format!(
                "section {index} is outside the table of contents ({} entries)",
                self.document.sections.len()
            ));
        };
        if section.status != SectionStatus::Pending
            || self.last_started.is_some_and(|last| index < last)
        {
            return self.violation(format!("section {index} started out of order"));
        }

        if let Some(previous) = self.active {
            tracing::debug!(previous, next = index, "completing section implicitly");
            self.complete_section(previous, patches);
        }

        let section = &mut self.document.sections[index];
        section.status = SectionStatus::Active;
        if let Some(title) = title.filter(|title| !title.trim().is_empty()) {
            section.heading = title;
        }
        self.active = Some(index);
        self.last_started = Some(index);
        patches.push(ReportPatch::SectionActivated {
            index,
            heading: section.heading.clone(),
        });
        None
    }

    fn append_chunk(&mut self, chunk: String, patches: &mut Vec<ReportPatch>) -> Option<Terminal> {
        let Some(index) = self.active else {
            return self.violation("report chunk with no active section".to_string());
        };
        let section = &mut self.document.sections[index];
        section.raw.push_str(&chunk);
        patches.push(ReportPatch::SectionAppended {
            index,
            html: section.rendered(),
            delta: chunk,
        });
        None
    }

    fn finish_section(&mut self, index: usize, patches: &mut Vec<ReportPatch>) -> Option<Terminal> {
        if self.active != Some(index) {
            return self.violation(format!("step_done for section {index}, which is not active"));
        }
        self.complete_section(index, patches);
        None
    }

    fn complete_section(&mut self, index: usize, patches: &mut Vec<ReportPatch>) {
        if let Some(section) = self.document.sections.get_mut(index) {
            section.status = SectionStatus::Done;
        }
        if self.active == Some(index) {
            self.active = None;
        }
        patches.push(ReportPatch::SectionCompleted { index });
        if self.profile == ReportProfile::Extended {
            self.log(LogEntry::SectionCompleted { index }, patches);
        }
    }

    fn log(&mut self, entry: LogEntry, patches: &mut Vec<ReportPatch>) {
        let entry = self.document.log.push(entry).clone();
        patches.push(ReportPatch::LogAppended { entry });
    }

    fn apply_research(&mut self, event: ReportEvent, patches: &mut Vec<ReportPatch>) {
        if self.profile != ReportProfile::Extended {
            return;
        }
        let entry = match event {
            ReportEvent::Thought(text) => LogEntry::Thought { text },
            ReportEvent::RagSearch { query } => LogEntry::Search { query },
            ReportEvent::RagResult(evidence) => LogEntry::Evidence(evidence),
            ReportEvent::TakeNote(content) => LogEntry::Note { content },
            ReportEvent::ResearchDecision(decision) => LogEntry::Decision(decision),
            _ => return,
        };
        self.log(entry, patches);
    }
}

impl Reducer for ReportReducer {
    type Patch = ReportPatch;

    fn apply(&mut self, event: &RawEvent, patches: &mut Vec<ReportPatch>) -> Option<Terminal> {
        let event = match ReportEvent::from_raw(event) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(kind = event.kind(), %error, "dropping undecodable report event");
                return None;
            }
        };

        match event {
            ReportEvent::Toc(titles) => self.set_toc(titles, patches),
            ReportEvent::StepStart { index, title } => self.start_section(index, title, patches),
            ReportEvent::Chunk(chunk) => self.append_chunk(chunk, patches),
            ReportEvent::StepDone { index } => self.finish_section(index, patches),
            ReportEvent::Done => Some(Terminal::Success),
            ReportEvent::Error(message) => Some(Terminal::Error(message)),
            ReportEvent::Unknown(kind) => {
                tracing::debug!(%kind, "ignoring unknown report event");
                None
            }
            research => {
                self.apply_research(research, patches);
                None
            }
        }
    }

    fn end_of_stream(&mut self) -> Terminal {
        Terminal::Error("report stream ended before completion".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn feed(reducer: &mut ReportReducer, value: Value) -> (Vec<ReportPatch>, Option<Terminal>) {
        let event = RawEvent::from_value(value).expect("tagged");
        let mut patches = Vec::new();
        let terminal = reducer.apply(&event, &mut patches);
        (patches, terminal)
    }

    fn with_toc(profile: ReportProfile, policy: ViolationPolicy) -> ReportReducer {
        let mut reducer = ReportReducer::new(profile, policy);
        feed(
            &mut reducer,
            json!({"type": "toc", "payload": ["1. **Overview**", "2. Tariff analysis", "3. Risks"]}),
        );
        reducer
    }

    #[test]
    fn test_display_title_strips_numbering_and_emphasis() {
        assert_eq!(display_title("1. **Overview**"), "Overview");
        assert_eq!(display_title("12.Tariffs"), "Tariffs");
        assert_eq!(display_title("Risks 2. and more"), "Risks 2. and more");
    }

    #[test]
    fn test_toc_is_set_once() {
        let mut reducer = with_toc(ReportProfile::Standard, ViolationPolicy::Ignore);
        let headings: Vec<&str> = reducer
            .document()
            .sections
            .iter()
            .map(|section| section.heading.as_str())
            .collect();
        assert_eq!(headings, vec!["Overview", "Tariff analysis", "Risks"]);

        let (patches, terminal) = feed(&mut reducer, json!({"type": "toc", "payload": ["X"]}));
        assert!(patches.is_empty());
        assert_eq!(terminal, None);
        assert_eq!(reducer.document().sections.len(), 3);
    }

    #[test]
    fn test_chunk_before_toc_is_a_violation() {
        let mut lenient = ReportReducer::new(ReportProfile::Standard, ViolationPolicy::Ignore);
        let (patches, terminal) = feed(&mut lenient, json!({"type": "report_chunk", "payload": "x"}));
        assert!(patches.is_empty());
        assert_eq!(terminal, None);

        let mut strict = ReportReducer::new(ReportProfile::Standard, ViolationPolicy::Fail);
        let (_, terminal) = feed(&mut strict, json!({"type": "report_chunk", "payload": "x"}));
        assert!(matches!(terminal, Some(Terminal::Error(_))));
    }

    #[test]
    fn test_out_of_order_activation_is_rejected() {
        let mut reducer = with_toc(ReportProfile::Standard, ViolationPolicy::Ignore);
        feed(&mut reducer, json!({"type": "step_start", "payload": {"index": 1}}));
        let (patches, _) = feed(&mut reducer, json!({"type": "step_start", "payload": {"index": 0}}));
        assert!(patches.is_empty());
        let (patches, _) = feed(&mut reducer, json!({"type": "step_start", "payload": {"index": 7}}));
        assert!(patches.is_empty());

        assert_eq!(reducer.document().active_section().map(|s| s.index), Some(1));
        assert_eq!(reducer.document().sections[0].status, SectionStatus::Pending);
    }

    #[test]
    fn test_higher_start_completes_the_active_section() {
        let mut reducer = with_toc(ReportProfile::Standard, ViolationPolicy::Ignore);
        feed(&mut reducer, json!({"type": "step_start", "payload": {"index": 0}}));
        let (patches, _) = feed(
            &mut reducer,
            json!({"type": "step_start", "payload": {"index": 2, "title": "Risk review"}}),
        );
        assert_eq!(
            patches,
            vec![
                ReportPatch::SectionCompleted { index: 0 },
                ReportPatch::SectionActivated {
                    index: 2,
                    heading: "Risk review".to_string()
                },
            ]
        );
        let active: Vec<usize> = reducer
            .document()
            .sections
            .iter()
            .filter(|s| s.status == SectionStatus::Active)
            .map(|s| s.index)
            .collect();
        assert_eq!(active, vec![2]);
    }

    #[test]
    fn test_step_done_for_inactive_section_is_ignored() {
        let mut reducer = with_toc(ReportProfile::Standard, ViolationPolicy::Ignore);
        feed(&mut reducer, json!({"type": "step_start", "payload": {"index": 0}}));
        let (patches, _) = feed(&mut reducer, json!({"type": "step_done", "payload": {"index": 1}}));
        assert!(patches.is_empty());
        assert_eq!(reducer.document().sections[0].status, SectionStatus::Active);
    }

    #[test]
    fn test_chunks_accumulate_and_rerender() {
        let mut reducer = with_toc(ReportProfile::Standard, ViolationPolicy::Ignore);
        feed(&mut reducer, json!({"type": "step_start", "payload": {"index": 0}}));
        feed(&mut reducer, json!({"type": "report_chunk", "payload": "# A\n"}));
        let (patches, _) = feed(&mut reducer, json!({"type": "step_stream", "payload": {"chunk": "body"}}));
        assert_eq!(
            patches,
            vec![ReportPatch::SectionAppended {
                index: 0,
                delta: "body".to_string(),
                html: "<h1>A</h1>\n<p>body</p>\n".to_string(),
            }]
        );

        let (patches, _) = feed(&mut reducer, json!({"type": "report_chunk", "payload": ""}));
        let ReportPatch::SectionAppended { html, .. } = &patches[0] else {
            panic!("expected append");
        };
        assert_eq!(html, "<h1>A</h1>\n<p>body</p>\n");
        assert_eq!(reducer.document().sections[0].raw, "# A\nbody");
    }

    #[test]
    fn test_research_events_only_in_extended_profile() {
        let events = [
            json!({"type": "thought", "payload": "plan the outline"}),
            json!({"type": "rag_search", "payload": {"query": "HS 8542"}}),
            json!({"type": "rag_result", "payload": {"filename": "r01.txt", "snippet": "...", "score": 0.82}}),
            json!({"type": "take_note", "payload": {"content": "chips are exempt"}}),
            json!({"type": "research_decision", "payload": {
                "round": 2, "decision": "stop", "reason": "enough evidence", "source": "ai",
                "confidence": 0.9,
                "metrics": {"total_quality": 0.8, "score": 0.7, "richness": 0.6, "dedup": 0.5}
            }}),
        ];

        let mut standard = with_toc(ReportProfile::Standard, ViolationPolicy::Fail);
        for event in &events {
            let (patches, terminal) = feed(&mut standard, event.clone());
            assert!(patches.is_empty());
            assert_eq!(terminal, None);
        }
        assert!(standard.document().log.is_empty());

        let mut extended = with_toc(ReportProfile::Extended, ViolationPolicy::Fail);
        for event in &events {
            feed(&mut extended, event.clone());
        }
        feed(&mut extended, json!({"type": "step_start", "payload": {"index": 0}}));
        feed(&mut extended, json!({"type": "step_done", "payload": {"index": 0}}));

        let log = &extended.document().log;
        assert_eq!(log.len(), 6);
        assert!(matches!(&log.entries()[1], LogEntry::Search { query } if query == "HS 8542"));
        assert!(matches!(&log.entries()[4], LogEntry::Decision(d) if d.round == 2));
        assert_eq!(log.entries()[5], LogEntry::SectionCompleted { index: 0 });
    }

    #[test]
    fn test_error_keeps_partial_sections() {
        let mut reducer = with_toc(ReportProfile::Standard, ViolationPolicy::Ignore);
        feed(&mut reducer, json!({"type": "step_start", "payload": {"index": 0}}));
        feed(&mut reducer, json!({"type": "report_chunk", "payload": "partial"}));
        let (_, terminal) = feed(&mut reducer, json!({"type": "error", "payload": "model timeout"}));
        assert_eq!(terminal, Some(Terminal::Error("model timeout".to_string())));
        assert_eq!(reducer.document().sections[0].raw, "partial");
        assert_eq!(reducer.document().sections[0].status, SectionStatus::Active);
        assert!(matches!(reducer.end_of_stream(), Terminal::Error(_)));
    }
}
