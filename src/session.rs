//! Stream driver: turns a chunked response body into tokens.
//!
//! A [`StreamSession`] owns everything one streaming reply needs: the UTF-8
//! decoder, the frame buffer, and the cumulative response. Chunks are fed
//! through [`FrameSplitter`] -> [`parse_events`] -> [`extract_token`] ->
//! [`SpacingAccumulator`] strictly in arrival order.
//!
//! ```text
//! Init -> Reading -> Draining -> Closed
//!            \__________________/
//!             (terminal token)
//! ```

use std::ops::{Deref, DerefMut};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{ChunkSource, ClientError};
use crate::model::{FinishReason, StreamingToken};
use crate::options::{HeaderPolicy, SessionOptions};
use crate::spacing::SpacingAccumulator;
use crate::sse::{parse_events, FrameSplitter, SseEvent, Utf8Decoder};
use crate::stream::extract_token;

/// Media type a streaming body is expected to declare.
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Lifecycle of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Reading,
    Draining,
    Closed,
}

/// One delivered token, as sent by [`StreamSession::spawn`].
///
/// The terminal token is always delivered, even when its `delta` is empty,
/// so that `finish_reason` reaches the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUpdate {
    pub delta: String,
    pub cumulative: String,
    /// Set only on the terminal update.
    pub finish_reason: Option<FinishReason>,
}

impl TokenUpdate {
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Check a `Content-Type` value against [`EVENT_STREAM_MIME`], ignoring parameters.
pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case(EVENT_STREAM_MIME))
        .unwrap_or(false)
}

/// Calls [`ChunkSource::release`] exactly once when dropped.
///
/// The guard owns the source, so release also happens when the session
/// future is dropped mid-read or a callback panics.
struct ReleaseGuard<S: ChunkSource> {
    source: S,
}

impl<S: ChunkSource> Deref for ReleaseGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: ChunkSource> DerefMut for ReleaseGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: ChunkSource> Drop for ReleaseGuard<S> {
    fn drop(&mut self) {
        self.source.release();
    }
}

/// State for one streaming reply.
#[derive(Debug)]
pub struct StreamSession {
    request_id: String,
    options: SessionOptions,
    state: SessionState,
    decoder: Utf8Decoder,
    splitter: FrameSplitter,
    response: SpacingAccumulator,
    complete: bool,
    finish_reason: Option<FinishReason>,
    last_event_id: Option<String>,
    retry: Option<u64>,
    events_seen: usize,
    bytes_received: usize,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl StreamSession {
    pub fn new(options: SessionOptions) -> Self {
        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            request_id,
            options,
            state: SessionState::Init,
            decoder: Utf8Decoder::new(),
            splitter: FrameSplitter::new(),
            response: SpacingAccumulator::new(),
            complete: false,
            finish_reason: None,
            last_event_id: None,
            retry: None,
            events_seen: 0,
            bytes_received: 0,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Response reconstructed so far.
    pub fn cumulative(&self) -> &str {
        self.response.as_str()
    }

    /// Whether a terminal token has been seen.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    /// Most recent `id:` field.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Most recent valid `retry:` field, in milliseconds.
    pub fn retry(&self) -> Option<u64> {
        self.retry
    }

    /// Validate the body's content type against the session's [`HeaderPolicy`].
    pub fn check_content_type(&self, content_type: Option<&str>) -> Result<(), ClientError> {
        if is_event_stream(content_type) {
            return Ok(());
        }

        match self.options.header_policy {
            HeaderPolicy::Permissive => {
                warn!(
                    request_id = %self.request_id,
                    content_type = ?content_type,
                    "response is not an event stream, reading it anyway"
                );
                Ok(())
            }
            HeaderPolicy::Strict => Err(ClientError::InvalidStreamFormat {
                content_type: content_type.map(str::to_string),
            }),
        }
    }

    /// Feed one raw chunk, delivering tokens to `on_token`.
    ///
    /// Returns `true` once a terminal token has been seen; anything after it,
    /// in this chunk or later ones, is ignored.
    pub fn feed<F>(&mut self, chunk: &[u8], on_token: &mut F) -> bool
    where
        F: FnMut(&str, &str),
    {
        self.feed_tokens(chunk, &mut deltas_only(on_token))
    }

    fn feed_tokens<G>(&mut self, chunk: &[u8], on_token: &mut G) -> bool
    where
        G: FnMut(&StreamingToken, &str),
    {
        if self.complete || self.state == SessionState::Closed {
            return true;
        }
        self.state = SessionState::Reading;
        self.bytes_received += chunk.len();

        let text = self.decoder.decode(chunk);
        self.splitter.push(&text);

        for block in self.splitter.drain_blocks() {
            if self.handle_block(&block, on_token) {
                return true;
            }
        }
        false
    }

    /// End-of-stream pass over whatever is still buffered.
    ///
    /// A server may omit the blank line after its last record, so the
    /// remaining text is parsed as if it had been terminated.
    pub fn finish<F>(&mut self, on_token: &mut F) -> bool
    where
        F: FnMut(&str, &str),
    {
        self.finish_tokens(&mut deltas_only(on_token))
    }

    fn finish_tokens<G>(&mut self, on_token: &mut G) -> bool
    where
        G: FnMut(&StreamingToken, &str),
    {
        if self.complete || self.state == SessionState::Closed {
            return true;
        }
        self.state = SessionState::Draining;

        let tail = self.decoder.finish();
        self.splitter.push(&tail);

        let mut blocks = self.splitter.drain_blocks();
        let remainder = self.splitter.take_remainder();
        if !remainder.trim().is_empty() {
            debug!(
                request_id = %self.request_id,
                bytes = remainder.len(),
                "parsing unterminated trailing record"
            );
            blocks.push(remainder);
        }

        for block in blocks {
            if self.handle_block(&block, on_token) {
                return true;
            }
        }
        false
    }

    fn handle_block<G>(&mut self, block: &str, on_token: &mut G) -> bool
    where
        G: FnMut(&StreamingToken, &str),
    {
        for event in parse_events(block) {
            if self.handle_event(event, on_token) {
                return true;
            }
        }
        false
    }

    fn handle_event<G>(&mut self, event: SseEvent, on_token: &mut G) -> bool
    where
        G: FnMut(&StreamingToken, &str),
    {
        self.events_seen += 1;
        if event.id.is_some() {
            self.last_event_id = event.id;
        }
        if event.retry.is_some() {
            self.retry = event.retry;
        }

        let Some(token) = extract_token(&event.data) else {
            debug!(
                request_id = %self.request_id,
                event_type = %event.event_type,
                "event carries no choices, skipping"
            );
            return false;
        };

        if !token.content.is_empty() {
            self.response.push(&token.content);
        }
        on_token(&token, self.response.as_str());

        if token.is_complete {
            self.complete = true;
            self.finish_reason = token.finish_reason;
            info!(
                request_id = %self.request_id,
                finish_reason = ?self.finish_reason,
                events = self.events_seen,
                bytes = self.bytes_received,
                "stream complete"
            );
            return true;
        }
        false
    }

    /// Read `source` to completion and return the full response.
    ///
    /// `on_token` is called synchronously with `(delta, cumulative)` for every
    /// token with non-empty content. The source is released exactly once
    /// before this returns, whatever the outcome.
    pub async fn run<S, F>(self, source: S, on_token: F) -> Result<String, ClientError>
    where
        S: ChunkSource,
        F: FnMut(&str, &str),
    {
        self.run_inner(source, None, deltas_only(on_token)).await
    }

    /// Like [`run`](Self::run), but stops with [`ClientError::StreamCancelled`]
    /// as soon as `cancel` fires, even in the middle of a read.
    pub async fn run_with_cancel<S, F>(
        self,
        source: S,
        cancel: CancellationToken,
        on_token: F,
    ) -> Result<String, ClientError>
    where
        S: ChunkSource,
        F: FnMut(&str, &str),
    {
        self.run_inner(source, Some(cancel), deltas_only(on_token)).await
    }

    /// Drive the session on a tokio task, delivering tokens over a channel.
    ///
    /// Updates arrive in source order. Tokens with empty content are skipped,
    /// except the terminal one, which carries the finish reason. Aborting the
    /// returned handle cancels the session and releases the source.
    pub fn spawn<S>(
        self,
        source: S,
    ) -> (
        mpsc::UnboundedReceiver<TokenUpdate>,
        JoinHandle<Result<String, ClientError>>,
    )
    where
        S: ChunkSource + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let on_token = move |token: &StreamingToken, cumulative: &str| {
            if token.content.is_empty() && !token.is_complete {
                return;
            }
            // A dropped receiver only stops live updates; the final
            // response is still returned through the handle.
            let _ = tx.send(TokenUpdate {
                delta: token.content.clone(),
                cumulative: cumulative.to_string(),
                finish_reason: token.finish_reason.clone(),
            });
        };

        let handle = tokio::spawn(self.run_inner(source, None, on_token));

        (rx, handle)
    }

    async fn run_inner<S, G>(
        mut self,
        source: S,
        cancel: Option<CancellationToken>,
        mut on_token: G,
    ) -> Result<String, ClientError>
    where
        S: ChunkSource,
        G: FnMut(&StreamingToken, &str),
    {
        info!(request_id = %self.request_id, "stream session started");

        let result = self.drive(source, cancel.as_ref(), &mut on_token).await;
        self.state = SessionState::Closed;

        match result {
            Ok(()) => Ok(self.response.into_string()),
            Err(e) => {
                warn!(request_id = %self.request_id, error = %e, "stream session failed");
                Err(e.for_request(&self.request_id))
            }
        }
    }

    async fn drive<S, G>(
        &mut self,
        source: S,
        cancel: Option<&CancellationToken>,
        on_token: &mut G,
    ) -> Result<(), ClientError>
    where
        S: ChunkSource,
        G: FnMut(&StreamingToken, &str),
    {
        let mut source = ReleaseGuard { source };

        if !source.is_readable() {
            return Err(ClientError::StreamUnavailable(
                "transport did not provide a readable body".to_string(),
            ));
        }
        self.check_content_type(source.content_type().as_deref())?;

        self.state = SessionState::Reading;
        loop {
            let next = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(ClientError::StreamCancelled),
                    chunk = source.next_chunk() => chunk,
                },
                None => source.next_chunk().await,
            };

            match next? {
                Some(chunk) => {
                    debug!(request_id = %self.request_id, bytes = chunk.len(), "chunk received");
                    if self.feed_tokens(&chunk, on_token) {
                        break;
                    }
                }
                None => {
                    debug!(request_id = %self.request_id, "end of stream without terminal token");
                    self.finish_tokens(on_token);
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Adapt a `(delta, cumulative)` callback so it only sees tokens with content.
fn deltas_only<F>(mut on_token: F) -> impl FnMut(&StreamingToken, &str)
where
    F: FnMut(&str, &str),
{
    move |token: &StreamingToken, cumulative: &str| {
        if !token.content.is_empty() {
            on_token(&token.content, cumulative);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const HELLO: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n";
    const WORLD_STOP: &str =
        "data: {\"choices\":[{\"delta\":{\"content\":\"world\"},\"finish_reason\":\"stop\"}]}\n\ndata: [DONE]\n\n";

    #[derive(Clone)]
    struct MockSource {
        content_type: Option<String>,
        readable: bool,
        chunks: VecDeque<Result<Bytes, String>>,
        /// Block forever once chunks run out instead of signalling EOF.
        hang_at_end: bool,
        reads: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
    }

    impl MockSource {
        fn new(chunks: &[&str]) -> Self {
            Self {
                content_type: Some("text/event-stream; charset=utf-8".to_string()),
                readable: true,
                chunks: chunks
                    .iter()
                    .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                    .collect(),
                hang_at_end: false,
                reads: Arc::new(AtomicUsize::new(0)),
                releases: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChunkSource for MockSource {
        fn content_type(&self) -> Option<String> {
            self.content_type.clone()
        }

        fn is_readable(&self) -> bool {
            self.readable
        }

        async fn next_chunk(&mut self) -> Result<Option<Bytes>, ClientError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            match self.chunks.pop_front() {
                Some(Ok(chunk)) => Ok(Some(chunk)),
                Some(Err(message)) => Err(ClientError::Transport(message)),
                None if self.hang_at_end => std::future::pending().await,
                None => Ok(None),
            }
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn collect(session: &mut StreamSession, chunks: &[&[u8]]) -> Vec<(String, String)> {
        let mut seen = Vec::new();
        let mut on_token = |delta: &str, full: &str| seen.push((delta.to_string(), full.to_string()));
        for chunk in chunks {
            if session.feed(chunk, &mut on_token) {
                return seen;
            }
        }
        session.finish(&mut on_token);
        seen
    }

    #[test]
    fn test_is_event_stream() {
        assert!(is_event_stream(Some("text/event-stream")));
        assert!(is_event_stream(Some("Text/Event-Stream; charset=utf-8")));
        assert!(!is_event_stream(Some("application/json")));
        assert!(!is_event_stream(None));
    }

    #[test]
    fn test_feed_scenario_a_stops_before_done_marker() {
        let mut session = StreamSession::default();
        let seen = collect(&mut session, &[HELLO.as_bytes(), WORLD_STOP.as_bytes()]);

        assert_eq!(
            seen,
            vec![
                ("Hello".to_string(), "Hello".to_string()),
                ("world".to_string(), "Hello world".to_string()),
            ]
        );
        assert!(session.is_complete());
        assert_eq!(session.finish_reason(), Some(&FinishReason::Stop));
        assert_eq!(session.cumulative(), "Hello world");
    }

    #[test]
    fn test_feed_plain_text_keeps_session_open() {
        let mut session = StreamSession::default();
        let mut seen = Vec::new();
        let done = session.feed(b"data: I have tooth pain\n\n", &mut |d: &str, f: &str| {
            seen.push((d.to_string(), f.to_string()))
        });

        assert!(!done);
        assert_eq!(session.state(), SessionState::Reading);
        assert_eq!(
            seen,
            vec![("I have tooth pain".to_string(), "I have tooth pain".to_string())]
        );
    }

    #[test]
    fn test_chunk_boundaries_do_not_change_output() {
        let input = format!(
            "{}id: 3\nretry: 10\ndata: {{\"choices\":[{{\"delta\":{{\"content\":\"caf\u{e9}\"}}}}]}}\r\n\r\ndata: !\n\n{}",
            HELLO, WORLD_STOP
        );
        let bytes = input.as_bytes();

        let mut whole = StreamSession::default();
        let expected = collect(&mut whole, &[bytes]);
        assert_eq!(whole.cumulative(), "Hello café! world");

        for split in 0..=bytes.len() {
            let mut session = StreamSession::default();
            let seen = collect(&mut session, &[&bytes[..split], &bytes[split..]]);
            assert_eq!(seen, expected, "split at byte {}", split);
            assert_eq!(session.last_event_id(), Some("3"));
            assert_eq!(session.retry(), Some(10));
        }

        let mut session = StreamSession::default();
        let single_bytes: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(collect(&mut session, &single_bytes), expected);
    }

    #[test]
    fn test_sentinel_ignores_buffered_data() {
        let mut session = StreamSession::default();
        let seen = collect(&mut session, &[b"data: a\n\ndata: null\n\ndata: b\n\ndata: c".as_slice()]);

        assert_eq!(seen, vec![("a".to_string(), "a".to_string())]);
        assert!(session.is_complete());
        assert_eq!(session.finish_reason(), Some(&FinishReason::Stop));
    }

    #[test]
    fn test_finish_parses_unterminated_tail() {
        let mut session = StreamSession::default();
        let seen = collect(&mut session, &[b"data: one\n\ndata: two".as_slice()]);

        assert_eq!(seen.len(), 2);
        assert_eq!(session.cumulative(), "one two");
        assert_eq!(session.state(), SessionState::Draining);
        assert!(!session.is_complete());
    }

    #[test]
    fn test_discarded_and_empty_tokens_do_not_fire_callback() {
        let mut session = StreamSession::default();
        let seen = collect(
            &mut session,
            &[b"data: {\"object\":\"ping\"}\n\ndata: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n"
                .as_slice()],
        );

        assert!(seen.is_empty());
        assert_eq!(session.cumulative(), "");
    }

    #[tokio::test]
    async fn test_run_returns_response_and_releases_once() {
        let source = MockSource::new(&[HELLO, WORLD_STOP, "data: never read\n\n"]);
        let tracker = source.clone();
        let mut seen = Vec::new();

        let response = StreamSession::default()
            .run(source, |d: &str, _: &str| seen.push(d.to_string()))
            .await
            .unwrap();

        assert_eq!(response, "Hello world");
        assert_eq!(seen, vec!["Hello", "world"]);
        assert_eq!(tracker.reads(), 2);
        assert_eq!(tracker.releases(), 1);
    }

    #[tokio::test]
    async fn test_run_natural_eof_releases_once() {
        let source = MockSource::new(&["data: partial"]);
        let tracker = source.clone();

        let response = StreamSession::default().run(source, |_: &str, _: &str| {}).await.unwrap();

        assert_eq!(response, "partial");
        assert_eq!(tracker.releases(), 1);
    }

    #[tokio::test]
    async fn test_run_transport_error_releases_then_propagates() {
        let mut source = MockSource::new(&[HELLO]);
        source.chunks.push_back(Err("connection reset".to_string()));
        let tracker = source.clone();

        let err = StreamSession::new(SessionOptions::new().with_request_id("req-9"))
            .run(source, |_: &str, _: &str| {})
            .await
            .unwrap_err();

        assert_eq!(err.request_id(), Some("req-9"));
        assert!(matches!(err.root(), ClientError::Transport(_)));
        assert_eq!(tracker.releases(), 1);
    }

    #[tokio::test]
    async fn test_run_unreadable_source_fails_before_reading() {
        let mut source = MockSource::new(&[HELLO]);
        source.readable = false;
        let tracker = source.clone();

        let err = StreamSession::default().run(source, |_: &str, _: &str| {}).await.unwrap_err();

        assert!(matches!(err.root(), ClientError::StreamUnavailable(_)));
        assert_eq!(tracker.reads(), 0);
        assert_eq!(tracker.releases(), 1);
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_wrong_content_type() {
        let mut source = MockSource::new(&[HELLO]);
        source.content_type = Some("application/json".to_string());
        let tracker = source.clone();

        let err = StreamSession::new(SessionOptions::strict())
            .run(source, |_: &str, _: &str| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err.root(),
            ClientError::InvalidStreamFormat { content_type: Some(ct) } if ct == "application/json"
        ));
        assert_eq!(tracker.reads(), 0);
        assert_eq!(tracker.releases(), 1);
    }

    #[tokio::test]
    async fn test_permissive_policy_reads_wrong_content_type() {
        let mut source = MockSource::new(&[HELLO]);
        source.content_type = None;

        let response = StreamSession::default().run(source, |_: &str, _: &str| {}).await.unwrap();
        assert_eq!(response, "Hello");
    }

    #[tokio::test]
    async fn test_cancel_mid_read_releases_once() {
        let mut source = MockSource::new(&[HELLO]);
        source.hang_at_end = true;
        let tracker = source.clone();
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(StreamSession::default().run_with_cancel(
            source,
            cancel.clone(),
            move |d: &str, _: &str| {
                let _ = tx.send(d.to_string());
            },
        ));

        assert_eq!(rx.recv().await.as_deref(), Some("Hello"));
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(tracker.releases(), 1);
    }

    #[tokio::test]
    async fn test_abort_spawned_session_releases_once() {
        let mut source = MockSource::new(&[HELLO]);
        source.hang_at_end = true;
        let tracker = source.clone();

        let (mut rx, handle) = StreamSession::default().spawn(source);
        assert_eq!(rx.recv().await.map(|u| u.delta), Some("Hello".to_string()));

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(tracker.releases(), 1);
    }

    #[tokio::test]
    async fn test_spawn_delivers_updates_in_order() {
        let source = MockSource::new(&[
            "data: one\n\ndata: two\n\n",
            "data: ,\n\ndata: three\n\n",
            "data: {\"choices\":[{\"delta\":null,\"finish_reason\":\"length\"}]}\n\n",
        ]);

        let (mut rx, handle) = StreamSession::default().spawn(source);

        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }

        let deltas: Vec<_> = updates.iter().map(|u| u.delta.as_str()).collect();
        assert_eq!(deltas, vec!["one", "two", ",", "three", ""]);
        assert!(updates[..4].iter().all(|u| u.finish_reason.is_none()));

        let last = updates.last().unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.finish_reason, Some(FinishReason::Length));
        assert_eq!(last.cumulative, "one two, three");
        assert_eq!(handle.await.unwrap().unwrap(), "one two, three");
    }

    #[tokio::test]
    async fn test_spawn_terminal_update_carries_content_and_reason() {
        let source = MockSource::new(&[HELLO, WORLD_STOP]);

        let (mut rx, handle) = StreamSession::default().spawn(source);

        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }

        assert_eq!(
            updates,
            vec![
                TokenUpdate {
                    delta: "Hello".to_string(),
                    cumulative: "Hello".to_string(),
                    finish_reason: None,
                },
                TokenUpdate {
                    delta: "world".to_string(),
                    cumulative: "Hello world".to_string(),
                    finish_reason: Some(FinishReason::Stop),
                },
            ]
        );
        assert_eq!(handle.await.unwrap().unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn test_panicking_callback_releases_once() {
        let source = MockSource::new(&[HELLO, WORLD_STOP]);
        let tracker = source.clone();

        let task = tokio::spawn(
            StreamSession::default().run(source, |_: &str, _: &str| panic!("consumer failed")),
        );

        let err = task.await.unwrap_err();
        assert!(err.is_panic());
        assert_eq!(tracker.reads(), 1);
        assert_eq!(tracker.releases(), 1);
    }
}
