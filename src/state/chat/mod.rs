mod filter;
mod registry;
mod transcript;

pub use filter::{FillerFilter, FilterBuildError};
pub use registry::{ToolCallEntry, ToolCallRegistry, ToolCallStatus};
pub use transcript::{
    ChatPatch, ChatReducer, ChatTranscript, DownloadLink, Segment, TextSegment, ToolCallSegment,
    ToolOverlay, Turn,
};

use super::Terminal;
use crate::runtime::Reducer;
use crate::types::{ChatEvent, RawEvent};

impl Reducer for ChatReducer {
    type Patch = ChatPatch;

    fn apply(&mut self, event: &RawEvent, patches: &mut Vec<ChatPatch>) -> Option<Terminal> {
        match event.decode::<ChatEvent>() {
            Ok(event) => self.apply_event(event, patches),
            Err(error) => {
                tracing::warn!(kind = event.kind(), %error, "dropping undecodable chat event");
                None
            }
        }
    }

    /// The chat backend has no terminal event; a clean end of body finishes the turn.
    fn end_of_stream(&mut self) -> Terminal {
        Terminal::Success
    }

    fn finish(&mut self, terminal: &Terminal) {
        self.record_outcome(terminal);
    }
}

#[cfg(test)]
mod tests;
