use crate::state::Terminal;
use crate::types::RawEvent;

/// A stateful fold over one workflow's events.
pub trait Reducer {
    type Patch;

    /// Applies one event, pushing the resulting model changes to `patches`.
    /// Returns the terminal outcome when the event ends the stream.
    fn apply(&mut self, event: &RawEvent, patches: &mut Vec<Self::Patch>) -> Option<Terminal>;

    /// Outcome when the body ends without a terminal event.
    fn end_of_stream(&mut self) -> Terminal;

    /// Called exactly once with the stream's outcome, whatever produced it.
    fn finish(&mut self, _terminal: &Terminal) {}
}
