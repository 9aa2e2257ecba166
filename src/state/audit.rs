use serde::Serialize;

use super::terminal::{protocol_violation, Terminal};
use crate::config::ViolationPolicy;
use crate::runtime::Reducer;
use crate::types::{AuditEvent, CardId, RawEvent, StepInfo};

const WORKFLOW: &str = "audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Thinking,
    Pass,
    Risk,
}

impl StepStatus {
    fn rank(self) -> u8 {
        match self {
            StepStatus::Pending => 0,
            StepStatus::Thinking => 1,
            StepStatus::Pass | StepStatus::Risk => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// Only the exact string `pass` passes; anything else is a risk.
    fn from_result(status: &str) -> Self {
        if status == "pass" {
            StepStatus::Pass
        } else {
            StepStatus::Risk
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepCard {
    pub id: CardId,
    pub title: String,
    pub icon: String,
    pub status: StepStatus,
    pub message: String,
}

impl StepCard {
    fn from_info(info: StepInfo) -> Self {
        Self {
            id: info.id,
            title: info.title,
            icon: info.icon,
            status: StepStatus::Pending,
            message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Risk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditVerdict {
    pub verdict: Verdict,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditDocument {
    pub total_steps: Option<usize>,
    pub cards: Vec<StepCard>,
    pub verdict: Option<AuditVerdict>,
}

impl AuditDocument {
    pub fn card(&self, id: &str) -> Option<&StepCard> {
        self.cards.iter().find(|card| card.id.as_str() == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "patch", rename_all = "snake_case")]
pub enum AuditPatch {
    Initialized { cards: Vec<StepCard> },
    CardUpdated { index: usize, card: StepCard },
    Completed { verdict: AuditVerdict },
}

/// Folds the audit stream into an ordered list of step cards.
#[derive(Debug, Default)]
pub struct AuditReducer {
    policy: ViolationPolicy,
    document: AuditDocument,
    initialized: bool,
}

impl AuditReducer {
    pub fn new(policy: ViolationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn document(&self) -> &AuditDocument {
        &self.document
    }

    pub fn into_document(self) -> AuditDocument {
        self.document
    }

    fn init(
        &mut self,
        total_steps: Option<usize>,
        steps: Vec<StepInfo>,
        patches: &mut Vec<AuditPatch>,
    ) -> Option<Terminal> {
        if self.initialized {
            return protocol_violation(self.policy, WORKFLOW, "second init event".to_string());
        }
        self.initialized = true;
        self.document.total_steps = total_steps;

        for info in steps {
            if self.document.cards.iter().any(|card| card.id == info.id) {
                tracing::warn!(id = %info.id, "duplicate step id in init, keeping the first");
                continue;
            }
            self.document.cards.push(StepCard::from_info(info));
        }

        patches.push(AuditPatch::Initialized {
            cards: self.document.cards.clone(),
        });
        None
    }

    fn advance(
        &mut self,
        id: &CardId,
        next: StepStatus,
        message: String,
        patches: &mut Vec<AuditPatch>,
    ) -> Option<Terminal> {
        let Some(index) = self.document.cards.iter().position(|card| &card.id == id) else {
            return protocol_violation(self.policy, WORKFLOW, format!("unknown step id '{id}'"));
        };

        let card = &mut self.document.cards[index];
        let allowed = match next {
            // A repeated step_start refreshes the loading text.
            StepStatus::Thinking => !card.status.is_terminal(),
            _ => !card.status.is_terminal() && card.status.rank() < next.rank(),
        };
        if !allowed {
            tracing::debug!(id = %id, from = ?card.status, to = ?next, "ignoring regressing step transition");
            return None;
        }

        card.status = next;
        card.message = message;
        patches.push(AuditPatch::CardUpdated {
            index,
            card: card.clone(),
        });
        None
    }
}

impl Reducer for AuditReducer {
    type Patch = AuditPatch;

    fn apply(&mut self, event: &RawEvent, patches: &mut Vec<AuditPatch>) -> Option<Terminal> {
        if self.document.verdict.is_some() {
            return None;
        }

        let event = match event.decode::<AuditEvent>() {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(kind = event.kind(), %error, "dropping undecodable audit event");
                return None;
            }
        };

        match event {
            AuditEvent::Init {
                total_steps,
                steps_info,
            } => self.init(total_steps, steps_info, patches),
            AuditEvent::StepStart {
                rule_id,
                loading_text,
            } => self.advance(&rule_id, StepStatus::Thinking, loading_text, patches),
            AuditEvent::StepResult {
                rule_id,
                status,
                message,
            } => self.advance(&rule_id, StepStatus::from_result(&status), message, patches),
            AuditEvent::Complete {
                final_status,
                summary,
            } => {
                let verdict = AuditVerdict {
                    verdict: match StepStatus::from_result(&final_status) {
                        StepStatus::Pass => Verdict::Pass,
                        _ => Verdict::Risk,
                    },
                    summary,
                };
                self.document.verdict = Some(verdict.clone());
                patches.push(AuditPatch::Completed { verdict });
                Some(Terminal::Success)
            }
            AuditEvent::Error { message } => Some(Terminal::Error(message)),
            AuditEvent::Unknown => {
                tracing::debug!("ignoring unknown audit event");
                None
            }
        }
    }

    fn end_of_stream(&mut self) -> Terminal {
        Terminal::Error("audit stream ended before completion".to_string())
    }
}
