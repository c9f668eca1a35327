//! # unai-sse - Streaming chat-completion decoding
//!
//! Turns a raw Server-Sent-Events response body into chat-completion
//! tokens, rebuilds the full reply as it streams, and hands every token to
//! a callback for live display.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Chunk-boundary independent: events and multi-byte characters may be
//!   split anywhere between network reads
//! - OpenAI-compatible JSON deltas with a plain-text fallback
//! - Stops reading at `[DONE]`, `null` or a `finish_reason`
//! - The response body is released exactly once on every exit path,
//!   including cancellation
//!
//! ## Pipeline
//!
//! ```text
//! bytes -> Utf8Decoder -> FrameSplitter -> parse_events -> extract_token -> SpacingAccumulator
//! ```
//!
//! [`StreamSession`] drives the pipeline over any [`ChunkSource`];
//! [`providers::OpenAiClient`] supplies one backed by `reqwest`.
//!
//! ## Example
//! ```no_run
//! use unai_sse::client::StreamingClient;
//! use unai_sse::model::Message;
//! use unai_sse::options::{HttpTransport, ModelOptions, OpenAiModel, TransportOptions};
//! use unai_sse::providers::OpenAiClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAiClient::new(
//!         ModelOptions::new(OpenAiModel::default()).with_model("gpt-4o-mini".to_string()),
//!         TransportOptions::new(HttpTransport::from_env()?),
//!     );
//!
//!     let reply = client
//!         .chat_stream(vec![Message::user("Hello!")], |delta, _cumulative| {
//!             print!("{}", delta);
//!         })
//!         .await?;
//!     println!("\n{}", reply);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod session;
pub mod spacing;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{ChunkSource, ClientError, StreamingClient};
pub use model::{FinishReason, Message, StreamingToken};
pub use session::{SessionState, StreamSession, TokenUpdate};
pub use sse::SseEvent;
pub use stream::StreamingPayload;
