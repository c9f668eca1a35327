//! Server-Sent Events (SSE) frame splitting and event parsing.
//!
//! Only the subset of SSE that chat-completion endpoints emit is handled:
//! ```text
//! event: message
//! id: 42
//! data: {"choices":[{"delta":{"content":"Hello"}}]}
//!
//! data: [DONE]
//!
//! ```
//!
//! Records are separated by a blank line. A repeated `data:` line inside one
//! record replaces the previous value instead of being joined with `\n`.

use tracing::trace;

/// Record delimiter after CRLF normalisation.
const RECORD_DELIMITER: &str = "\n\n";

/// Event type used when a record carries no `event:` line.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A parsed SSE record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event_type: String,
    pub data: String,
    pub id: Option<String>,
    /// Reconnection delay in milliseconds.
    pub retry: Option<u64>,
}

/// Splits an accumulating text buffer into complete event blocks.
///
/// Text is appended with [`push`](Self::push); every complete block is
/// removed by [`drain_blocks`](Self::drain_blocks). Whatever follows the last
/// delimiter stays buffered until more text arrives.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: String,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded text to the buffer.
    pub fn push(&mut self, text: &str) {
        // Buffered text is already normalised. Only `text` and the seam need
        // it: a "\r" ending the previous push pairs with a leading "\n".
        if self.buffer.ends_with('\r') && text.starts_with('\n') {
            self.buffer.pop();
        }

        if text.contains("\r\n") {
            self.buffer.push_str(&text.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(text);
        }
    }

    /// Remove and return every complete block, in order.
    ///
    /// Empty blocks (two delimiters in a row) are skipped. Calling this on a
    /// buffer without a delimiter returns nothing and leaves it untouched.
    pub fn drain_blocks(&mut self) -> Vec<String> {
        let mut blocks = Vec::new();

        while let Some(pos) = self.buffer.find(RECORD_DELIMITER) {
            let block: String = self.buffer[..pos].to_string();
            self.buffer.drain(..pos + RECORD_DELIMITER.len());

            if !block.trim().is_empty() {
                blocks.push(block);
            }
        }

        blocks
    }

    /// Take the undelimited tail, leaving the buffer empty.
    pub fn take_remainder(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    /// Text buffered but not yet forming a complete block.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Parse one event block into an [`SseEvent`].
///
/// Returns `None` when no `data:` line was seen. Unknown prefixes and
/// comment lines are ignored; a non-numeric `retry:` value is dropped.
pub fn parse_event_block(block: &str) -> Option<SseEvent> {
    let mut event_type = DEFAULT_EVENT_TYPE.to_string();
    let mut data: Option<String> = None;
    let mut id = None;
    let mut retry = None;

    for line in block.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(rest) = line.strip_prefix("data:") {
            data = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("event:") {
            event_type = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("id:") {
            id = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("retry:") {
            match rest.trim().parse::<u64>() {
                Ok(ms) => retry = Some(ms),
                Err(_) => trace!(value = rest.trim(), "ignoring non-numeric retry field"),
            }
        } else if !line.is_empty() && !line.starts_with(':') {
            trace!(line, "ignoring unrecognised SSE line");
        }
    }

    data.map(|data| SseEvent {
        event_type,
        data,
        id,
        retry,
    })
}

/// Parse a block that may still contain blank-line separated sub-blocks,
/// yielding one event per sub-block that carries data.
pub fn parse_events(block: &str) -> Vec<SseEvent> {
    let normalised;
    let block = if block.contains("\r\n") {
        normalised = block.replace("\r\n", "\n");
        normalised.as_str()
    } else {
        block
    };

    block
        .split(RECORD_DELIMITER)
        .filter(|sub| !sub.trim().is_empty())
        .filter_map(parse_event_block)
        .collect()
}

/// Incremental UTF-8 decoder.
///
/// A multi-byte character split across two chunks is held back until the
/// rest of it arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `chunk` (plus any held-back bytes) as possible.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;

        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_end = consumed + err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[consumed..valid_end]) {
                        out.push_str(text);
                    }
                    consumed = valid_end;

                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += len;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => break,
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }

    /// Flush held-back bytes at end of stream.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }

    /// Number of bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
