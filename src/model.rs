//! Common data models for streaming chat completions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    /// Any reason string not covered above, kept verbatim.
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Other(reason) => reason,
        }
    }
}

impl From<&str> for FinishReason {
    fn from(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            "tool_calls" => FinishReason::ToolCalls,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded unit of a streaming response.
///
/// A token with `is_complete == true` is terminal: the session stops
/// reading as soon as it sees one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingToken {
    /// Delta content, may be empty.
    pub content: String,
    pub is_complete: bool,
    pub finish_reason: Option<FinishReason>,
}

impl StreamingToken {
    /// Terminal token produced by a `[DONE]` / `null` / empty payload.
    pub fn sentinel() -> Self {
        Self {
            content: String::new(),
            is_complete: true,
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// Non-terminal token carrying raw text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_complete: false,
            finish_reason: None,
        }
    }
}

// --- OpenAI-compatible streaming chunk types ---

/// The parts of a `chat.completion.chunk` object that streaming reads.
///
/// Decoding is lenient: only `choices[i].delta.content` and
/// `choices[i].finish_reason` are looked at, and a missing, null or
/// mistyped value reads as `None` instead of rejecting the chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatChunk {
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkDelta {
    pub content: Option<String>,
}

impl From<&Value> for ChatChunk {
    fn from(value: &Value) -> Self {
        let choices = value
            .get("choices")
            .and_then(Value::as_array)
            .map(|choices| choices.iter().map(ChunkChoice::from).collect())
            .unwrap_or_default();

        Self { choices }
    }
}

impl From<&Value> for ChunkChoice {
    fn from(value: &Value) -> Self {
        let content = value
            .get("delta")
            .and_then(|delta| delta.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let finish_reason = value
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            delta: ChunkDelta { content },
            finish_reason,
        }
    }
}
