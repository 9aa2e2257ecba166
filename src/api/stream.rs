use crate::types::RawEvent;

pub const FRAME_DELIMITER: &str = "\n\n";
pub const EVENT_PREFIX: &str = "data: ";

/// Incremental UTF-8 decoder. An incomplete multi-byte sequence at the end of a
/// chunk is held back until the next chunk completes it; bytes that can never
/// form valid UTF-8 become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(error) => {
                    let (valid, after) = rest.split_at(error.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(&String::from_utf8_lossy(valid));
                    match error.error_len() {
                        Some(invalid_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[invalid_len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes a dangling partial sequence at end of input.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Splits decoded text into `\n\n`-delimited frames and parses the `data: ` ones.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8ChunkDecoder,
    buffer: String,
    // Prefix of `buffer` already known to hold no delimiter.
    scanned: usize,
    dropped: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes from the transport.
    pub fn process(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        let text = self.utf8.decode(chunk);
        self.push_str(&text)
    }

    /// Feeds already-decoded text.
    pub fn push_str(&mut self, text: &str) -> Vec<RawEvent> {
        self.buffer.push_str(text);
        let mut events = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;

        while let Some(end) = self.buffer[search_from..].find(FRAME_DELIMITER) {
            let frame_end = search_from + end;
            if let Some(event) = self.parse_frame(start, frame_end) {
                events.push(event);
            }
            start = frame_end + FRAME_DELIMITER.len();
            search_from = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        // A delimiter may straddle the next push, so keep its first byte unscanned.
        let mut scanned = self.buffer.len().saturating_sub(FRAME_DELIMITER.len() - 1);
        while !self.buffer.is_char_boundary(scanned) {
            scanned -= 1;
        }
        self.scanned = scanned;

        events
    }

    fn parse_frame(&mut self, start: usize, end: usize) -> Option<RawEvent> {
        let frame = &self.buffer[start..end];
        let json_data = frame.strip_prefix(EVENT_PREFIX)?;

        match serde_json::from_str::<serde_json::Value>(json_data) {
            Ok(value) => {
                let event = RawEvent::from_value(value);
                if event.is_none() {
                    self.dropped += 1;
                    tracing::warn!(frame = %truncate_for_log(json_data), "dropping frame without a string `type`");
                }
                event
            }
            Err(error) => {
                self.dropped += 1;
                tracing::warn!(%error, frame = %truncate_for_log(json_data), "dropping malformed frame");
                None
            }
        }
    }

    /// Ends the input. Text after the last delimiter is an unterminated frame
    /// and is discarded; the returned string is what was thrown away.
    pub fn finish(&mut self) -> String {
        let tail = self.utf8.finish();
        self.buffer.push_str(&tail);
        let leftover = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if !leftover.trim().is_empty() {
            tracing::debug!(bytes = leftover.len(), "discarding unterminated trailing frame");
        }
        leftover
    }

    /// Number of frames dropped because they were not valid tagged JSON.
    pub fn dropped_frames(&self) -> usize {
        self.dropped
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn truncate_for_log(text: &str) -> &str {
    const MAX: usize = 200;
    if text.len() <= MAX {
        return text;
    }
    let mut cut = MAX;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}
