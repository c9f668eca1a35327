//! Interpretation of SSE `data` payloads as streaming tokens.

use serde_json::Value;
use tracing::trace;

use crate::model::{ChatChunk, FinishReason, StreamingToken};

/// Literal payload some servers send to mark the end of the stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Literal `null` payload, treated the same as [`DONE_MARKER`].
pub const NULL_MARKER: &str = "null";

/// Decoded shape of an event's `data` field.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamingPayload {
    /// Empty, `[DONE]` or `null`.
    Sentinel,
    /// Valid JSON in the chat-completion chunk shape (choices may be empty).
    Chunk(ChatChunk),
    /// Anything that is not JSON, delivered as-is.
    Plain(String),
}

impl StreamingPayload {
    /// Classify a raw `data` payload.
    pub fn parse(data: &str) -> Self {
        if is_done_marker(data) {
            return StreamingPayload::Sentinel;
        }

        match serde_json::from_str::<Value>(data) {
            // JSON of some other shape (a bare string, a number, an object
            // whose `choices` is not a list) carries no choices.
            Ok(value) => StreamingPayload::Chunk(ChatChunk::from(&value)),
            Err(err) => {
                trace!(error = %err, "payload is not JSON, using plain text");
                StreamingPayload::Plain(data.to_string())
            }
        }
    }

    /// Convert into a token. `None` means the payload is discarded.
    pub fn into_token(self) -> Option<StreamingToken> {
        match self {
            StreamingPayload::Sentinel => Some(StreamingToken::sentinel()),
            StreamingPayload::Plain(text) => Some(StreamingToken::text(text)),
            StreamingPayload::Chunk(chunk) => {
                let choice = chunk.choices.into_iter().next()?;
                let finish_reason = choice.finish_reason.as_deref().map(FinishReason::from);

                Some(StreamingToken {
                    content: choice.delta.content.unwrap_or_default(),
                    is_complete: finish_reason.is_some(),
                    finish_reason,
                })
            }
        }
    }
}

/// Check whether a payload marks the end of the stream.
///
/// # Example
/// ```
/// use unai_sse::stream::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(is_done_marker("null"));
/// assert!(is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data.is_empty() || data == DONE_MARKER || data == NULL_MARKER
}

/// Extract the streaming token carried by an event's `data` field.
pub fn extract_token(data: &str) -> Option<StreamingToken> {
    StreamingPayload::parse(data).into_token()
}
