use serde::Serialize;

use crate::types::{Evidence, ResearchDecision};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum LogEntry {
    Thought { text: String },
    Search { query: String },
    /// Retrieved evidence; the full document behind `filename` is fetched on
    /// demand through [`EvidenceDetails`](super::EvidenceDetails).
    Evidence(Evidence),
    Note { content: String },
    Decision(ResearchDecision),
    SectionCompleted { index: usize },
}

/// Research trail of the extended report profile. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResearchLog {
    entries: Vec<LogEntry>,
}

impl ResearchLog {
    pub fn push(&mut self, entry: LogEntry) -> &LogEntry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn evidence(&self) -> impl Iterator<Item = &Evidence> {
        self.entries.iter().filter_map(|entry| match entry {
            LogEntry::Evidence(evidence) => Some(evidence),
            _ => None,
        })
    }
}
