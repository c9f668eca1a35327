//! Core client traits and error types.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::model::Message;
use crate::options::{ModelOptions, SessionOptions, TransportOptions};
use crate::session::StreamSession;

/// Errors that can occur while opening or driving a stream.
///
/// Only hard failures are represented here. Unknown SSE lines, non-JSON
/// payloads and bad `retry:` values are absorbed by the parser.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid stream format: expected text/event-stream, got {content_type:?}")]
    InvalidStreamFormat { content_type: Option<String> },

    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Stream cancelled")]
    StreamCancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    /// A session failure tagged with the request that produced it.
    #[error("request {request_id}: {source}")]
    Request {
        request_id: String,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Attach a request id. Already-tagged errors are returned unchanged.
    pub fn for_request(self, request_id: &str) -> Self {
        match self {
            tagged @ ClientError::Request { .. } => tagged,
            other => ClientError::Request {
                request_id: request_id.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Id of the originating request, if the error carries one.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ClientError::Request { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// The underlying error with any request context stripped.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Request { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), ClientError::StreamCancelled)
    }

    /// Message suitable for showing to an end user.
    ///
    /// Every hard failure maps to the same text; details belong in logs.
    pub fn user_message(&self) -> &'static str {
        match self.root() {
            ClientError::StreamCancelled => "The response was cancelled.",
            _ => "Sorry, something went wrong while generating a response. Please try again.",
        }
    }
}

/// A readable streaming response body.
///
/// Exactly one [`StreamSession`] owns a source for the duration of a
/// session; the session calls [`release`](Self::release) once on every
/// exit path.
#[async_trait]
pub trait ChunkSource: Send {
    /// Value of the `Content-Type` response header, if any.
    fn content_type(&self) -> Option<String>;

    /// Whether a body is available to read at all.
    fn is_readable(&self) -> bool {
        true
    }

    /// Read the next chunk. `Ok(None)` signals end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ClientError>;

    /// Release the underlying reader.
    fn release(&mut self);
}

/// Main client trait for streaming chat providers.
///
/// Implementors supply [`open_stream`](Self::open_stream); the provided
/// methods drive a [`StreamSession`] over the returned source.
///
/// # Example
/// ```rust,ignore
/// let client = OpenAiClient::new(model_options, transport_options);
/// let reply = client
///     .chat_stream(vec![Message::user("Hello!")], |delta, _full| print!("{delta}"))
///     .await?;
/// ```
#[async_trait]
pub trait StreamingClient: Send + Sync + Sized {
    /// Provider-specific model options type.
    type ModelProvider: Send + Sync;

    /// Provider-specific transport options type.
    type TransportProvider: Send + Sync;

    /// Readable body returned by [`open_stream`](Self::open_stream).
    type Source: ChunkSource;

    /// Send a streaming request and return its body without reading it.
    async fn open_stream(
        messages: Vec<Message>,
        model_options: &ModelOptions<Self::ModelProvider>,
        transport_options: &TransportOptions<Self::TransportProvider>,
    ) -> Result<Self::Source, ClientError>;

    fn new(
        model_options: ModelOptions<Self::ModelProvider>,
        transport_options: TransportOptions<Self::TransportProvider>,
    ) -> Self;

    fn model_options(&self) -> &ModelOptions<Self::ModelProvider>;

    fn transport_options(&self) -> &TransportOptions<Self::TransportProvider>;

    /// Stream a reply with the client's default options.
    ///
    /// `on_token` receives `(delta, cumulative)` for every non-empty token
    /// in arrival order. Returns the full reconstructed response.
    async fn chat_stream<F>(
        &self,
        messages: Vec<Message>,
        on_token: F,
    ) -> Result<String, ClientError>
    where
        F: FnMut(&str, &str) + Send,
    {
        self.chat_stream_with_options(
            messages,
            self.model_options(),
            SessionOptions::default(),
            on_token,
        )
        .await
    }

    /// Stream a reply overriding model and session options.
    async fn chat_stream_with_options<F>(
        &self,
        messages: Vec<Message>,
        model_options: &ModelOptions<Self::ModelProvider>,
        session_options: SessionOptions,
        on_token: F,
    ) -> Result<String, ClientError>
    where
        F: FnMut(&str, &str) + Send,
    {
        let session = StreamSession::new(session_options);
        let request_id = session.request_id().to_string();

        let source = Self::open_stream(messages, model_options, self.transport_options())
            .await
            .map_err(|e| e.for_request(&request_id))?;

        session.run(source, on_token).await
    }
}
