use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use super::filter::FillerFilter;
use super::registry::{ToolCallRegistry, ToolCallStatus};
use crate::state::Terminal;
use crate::types::{payload_text, ChatEvent, DisplayConfig};

const EXPORT_TOOL: &str = "export_document_file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    /// Markdown source, only ever appended to.
    pub markdown: String,
    pub closed: bool,
}

/// Transient progress banner shown while a tool runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOverlay {
    pub title: String,
    pub show_progress: bool,
    pub animation: String,
}

impl ToolOverlay {
    fn from_config(config: &DisplayConfig) -> Option<Self> {
        let title = config.title.as_deref()?.trim();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            title: title.to_string(),
            show_progress: config.show_progress,
            animation: config
                .animation
                .clone()
                .unwrap_or_else(|| "fade".to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLink {
    pub filename: String,
    pub url: String,
}

impl DownloadLink {
    fn find(result: &str) -> Option<Self> {
        static DOWNLOAD: OnceLock<Option<Regex>> = OnceLock::new();
        let pattern = DOWNLOAD
            .get_or_init(|| Regex::new(r"/downloads/([A-Za-z0-9_\-.]+\.docx)").ok())
            .as_ref()?;
        let filename = pattern.captures(result)?.get(1)?.as_str().to_string();
        Some(Self {
            url: format!("/downloads/{filename}"),
            filename,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallSegment {
    pub index: usize,
    pub name: String,
    pub call_id: Option<String>,
    pub status: ToolCallStatus,
    pub result: String,
    pub overlay: Option<ToolOverlay>,
    pub download: Option<DownloadLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text(TextSegment),
    ToolCall(ToolCallSegment),
}

impl Segment {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(text) => Some(&text.markdown),
            Segment::ToolCall(_) => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallSegment> {
        match self {
            Segment::ToolCall(call) => Some(call),
            Segment::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub user_message: String,
    pub segments: Vec<Segment>,
    pub outcome: Option<Terminal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatTranscript {
    pub turns: Vec<Turn>,
}

impl ChatTranscript {
    pub fn current_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "patch", rename_all = "snake_case")]
pub enum ChatPatch {
    TurnStarted {
        turn: usize,
        user_message: String,
    },
    TextOpened {
        turn: usize,
        segment: usize,
    },
    TextAppended {
        turn: usize,
        segment: usize,
        delta: String,
    },
    ToolStarted {
        turn: usize,
        segment: usize,
        call: ToolCallSegment,
    },
    /// The call finished; any overlay it had is dismissed.
    ToolFinished {
        turn: usize,
        segment: usize,
        call: ToolCallSegment,
    },
}

/// Folds chat events into a transcript of turns. One instance lives as long as
/// the chat session; per-turn state is reset by [`ChatReducer::begin_turn`].
#[derive(Debug, Default)]
pub struct ChatReducer {
    transcript: ChatTranscript,
    registry: ToolCallRegistry,
    filter: Option<FillerFilter>,
}

impl ChatReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FillerFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn registry(&self) -> &ToolCallRegistry {
        &self.registry
    }

    /// Starts a new turn for `user_message` and clears the tool registry.
    pub fn begin_turn(&mut self, user_message: impl Into<String>) -> ChatPatch {
        let user_message = user_message.into();
        self.registry.clear();
        self.transcript.turns.push(Turn {
            user_message: user_message.clone(),
            ..Turn::default()
        });
        ChatPatch::TurnStarted {
            turn: self.transcript.turns.len() - 1,
            user_message,
        }
    }

    fn turn_index(&mut self, patches: &mut Vec<ChatPatch>) -> usize {
        if self.transcript.turns.is_empty() {
            patches.push(self.begin_turn(String::new()));
        }
        self.transcript.turns.len() - 1
    }

    pub(super) fn apply_event(
        &mut self,
        event: ChatEvent,
        patches: &mut Vec<ChatPatch>,
    ) -> Option<Terminal> {
        match event {
            ChatEvent::Answer { content } => {
                self.append_answer(content, patches);
                None
            }
            ChatEvent::Thinking { .. } => None,
            ChatEvent::ToolStart {
                tool_name,
                display_config,
                tool_call_id,
            } => {
                self.start_tool(tool_name, display_config, tool_call_id, patches);
                None
            }
            ChatEvent::ToolEnd {
                tool_name,
                tool_result,
                tool_call_id,
            } => {
                self.finish_tool(&tool_name, tool_result, tool_call_id.as_deref(), patches);
                None
            }
            ChatEvent::Error { content } => Some(Terminal::Error(content)),
            ChatEvent::Unknown => None,
        }
    }

    fn append_answer(&mut self, content: String, patches: &mut Vec<ChatPatch>) {
        if content.is_empty() {
            return;
        }
        if let Some(filter) = &self.filter {
            if filter.is_filler(&content) {
                tracing::debug!(chunk = %content, "suppressing filler answer chunk");
                return;
            }
        }

        let turn = self.turn_index(patches);
        let segments = &mut self.transcript.turns[turn].segments;
        let open = matches!(segments.last(), Some(Segment::Text(text)) if !text.closed);
        if !open {
            segments.push(Segment::Text(TextSegment {
                markdown: String::new(),
                closed: false,
            }));
            patches.push(ChatPatch::TextOpened {
                turn,
                segment: segments.len() - 1,
            });
        }

        let segment = segments.len() - 1;
        if let Some(Segment::Text(text)) = segments.last_mut() {
            text.markdown.push_str(&content);
        }
        patches.push(ChatPatch::TextAppended {
            turn,
            segment,
            delta: content,
        });
    }

    fn start_tool(
        &mut self,
        name: String,
        display_config: Option<DisplayConfig>,
        call_id: Option<String>,
        patches: &mut Vec<ChatPatch>,
    ) {
        let turn = self.turn_index(patches);
        let segments = &mut self.transcript.turns[turn].segments;
        if let Some(Segment::Text(text)) = segments.last_mut() {
            text.closed = true;
        }

        let segment = segments.len();
        let index = self.registry.register(&name, call_id.clone(), segment);
        let call = ToolCallSegment {
            index,
            name,
            call_id,
            status: ToolCallStatus::Calling,
            result: String::new(),
            overlay: display_config.as_ref().and_then(ToolOverlay::from_config),
            download: None,
        };
        segments.push(Segment::ToolCall(call.clone()));
        patches.push(ChatPatch::ToolStarted {
            turn,
            segment,
            call,
        });
    }

    fn finish_tool(
        &mut self,
        name: &str,
        result: Option<serde_json::Value>,
        call_id: Option<&str>,
        patches: &mut Vec<ChatPatch>,
    ) {
        let Some(entry) = self.registry.complete(name, call_id) else {
            tracing::debug!(tool = name, "tool_end without a pending call");
            return;
        };
        let Some(turn) = self.transcript.turns.len().checked_sub(1) else {
            return;
        };
        let Some(Segment::ToolCall(call)) =
            self.transcript.turns[turn].segments.get_mut(entry.segment)
        else {
            return;
        };

        call.status = ToolCallStatus::Done;
        call.result = result.as_ref().map(payload_text).unwrap_or_default();
        call.overlay = None;
        if call.name == EXPORT_TOOL {
            call.download = DownloadLink::find(&call.result);
        }
        patches.push(ChatPatch::ToolFinished {
            turn,
            segment: entry.segment,
            call: call.clone(),
        });
    }

    pub(super) fn record_outcome(&mut self, terminal: &Terminal) {
        if let Some(turn) = self.transcript.turns.last_mut() {
            turn.outcome = Some(terminal.clone());
        }
    }
}
