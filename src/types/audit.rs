use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of an audit step. The backend sends rule ids as strings, older
/// payloads used bare numbers; both decode to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for CardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => CardId(text),
            Repr::Number(number) => CardId(number.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepInfo {
    pub id: CardId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    Init {
        #[serde(default)]
        total_steps: Option<usize>,
        #[serde(default)]
        steps_info: Vec<StepInfo>,
    },
    StepStart {
        rule_id: CardId,
        #[serde(default)]
        loading_text: String,
    },
    StepResult {
        rule_id: CardId,
        #[serde(default)]
        status: String,
        #[serde(default)]
        message: String,
    },
    Complete {
        #[serde(default)]
        final_status: String,
        #[serde(default)]
        summary: String,
    },
    Error {
        #[serde(default, alias = "content", alias = "payload")]
        message: String,
    },
    #[serde(other)]
    Unknown,
}
