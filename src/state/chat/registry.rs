use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Calling,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallEntry {
    pub index: usize,
    pub name: String,
    pub call_id: Option<String>,
    /// Position of the call's segment within the current turn.
    pub segment: usize,
    pub status: ToolCallStatus,
}

/// In-flight tool calls of the current turn, in registration order.
#[derive(Debug, Default)]
pub struct ToolCallRegistry {
    entries: Vec<ToolCallEntry>,
    next_index: usize,
}

impl ToolCallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the previous turn's calls. Indices keep counting up so a segment
    /// from an older turn can never be addressed by a newer call.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn register(&mut self, name: &str, call_id: Option<String>, segment: usize) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        self.entries.push(ToolCallEntry {
            index,
            name: name.to_string(),
            call_id,
            segment,
            status: ToolCallStatus::Calling,
        });
        index
    }

    /// Marks the call a `tool_end` refers to as done and returns it. An echoed
    /// call id wins; otherwise the oldest still-calling entry with that name.
    pub fn complete(&mut self, name: &str, call_id: Option<&str>) -> Option<ToolCallEntry> {
        let calling = |entry: &ToolCallEntry| entry.status == ToolCallStatus::Calling;

        let by_id = call_id.and_then(|id| {
            self.entries
                .iter()
                .position(|entry| calling(entry) && entry.call_id.as_deref() == Some(id))
        });
        let position = by_id.or_else(|| {
            self.entries
                .iter()
                .position(|entry| calling(entry) && entry.name == name)
        })?;

        let entry = &mut self.entries[position];
        entry.status = ToolCallStatus::Done;
        Some(entry.clone())
    }

    pub fn pending(&self) -> impl Iterator<Item = &ToolCallEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.status == ToolCallStatus::Calling)
    }

    pub fn entries(&self) -> &[ToolCallEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
