use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Optional presentation hints attached to `tool_start`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub show_progress: bool,
    #[serde(default)]
    pub animation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Answer {
        #[serde(default)]
        content: String,
    },
    Thinking {
        #[serde(default)]
        content: String,
    },
    ToolStart {
        tool_name: String,
        #[serde(default)]
        display_config: Option<DisplayConfig>,
        #[serde(default, alias = "call_id")]
        tool_call_id: Option<String>,
    },
    ToolEnd {
        tool_name: String,
        #[serde(default)]
        tool_result: Option<Value>,
        #[serde(default, alias = "call_id")]
        tool_call_id: Option<String>,
    },
    Error {
        #[serde(default, alias = "message")]
        content: String,
    },
    #[serde(other)]
    Unknown,
}
