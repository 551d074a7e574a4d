use std::fmt::Display;
use std::future::Future;

use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use super::decoder::LineDecoder;
use super::frame::StreamFrame;

/// Text that replaces a placeholder whose stream failed at the transport level.
pub const STREAM_FAILURE_NOTICE: &str =
    "Désolé, une erreur est survenue lors de la communication avec l'assistant. \
     Veuillez réessayer.";

/// Lifecycle of one streamed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Opened,
    Receiving,
    Completed,
    Failed,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Failed)
    }
}

/// Whether the caller should keep reading the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Display-side target of a stream: the placeholder message it is bound to.
pub trait MessageSink {
    /// Replaces the placeholder content with everything received so far.
    fn publish(&mut self, content: &str);

    /// The reply ended normally; the content is final. `agent` is the label
    /// the server announced for the answering agent, if any.
    fn complete(&mut self, agent: Option<&str>);

    /// The reply failed; `notice` replaces whatever was shown.
    fn fail(&mut self, notice: &str);
}

impl<T: MessageSink + ?Sized> MessageSink for &mut T {
    fn publish(&mut self, content: &str) {
        (**self).publish(content)
    }

    fn complete(&mut self, agent: Option<&str>) {
        (**self).complete(agent)
    }

    fn fail(&mut self, notice: &str) {
        (**self).fail(notice)
    }
}

/// Turns the byte chunks of one streamed reply into republished content for a
/// single placeholder.
///
/// The consumer owns the accumulator for its stream. Once it reaches
/// [`StreamState::Completed`] or [`StreamState::Failed`] every further input
/// is ignored and the sink is never touched again.
pub struct StreamConsumer<S: MessageSink> {
    sink: S,
    decoder: LineDecoder,
    accumulated: String,
    state: StreamState,
    agent: Option<String>,
}

impl<S: MessageSink> StreamConsumer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            decoder: LineDecoder::new(),
            accumulated: String::new(),
            state: StreamState::Idle,
            agent: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Everything accumulated so far.
    pub fn content(&self) -> &str {
        &self.accumulated
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Marks the response headers as received.
    pub fn open(&mut self) {
        if self.state == StreamState::Idle {
            self.state = StreamState::Opened;
        }
    }

    /// Feeds one chunk of the body. Returns [`Flow::Stop`] once the stream is
    /// terminal, either from a completion flag in this chunk or earlier.
    pub fn feed(&mut self, chunk: &[u8]) -> Flow {
        if self.state.is_terminal() {
            return Flow::Stop;
        }
        self.state = StreamState::Receiving;

        for line in self.decoder.push(chunk) {
            if self.apply_line(&line) == Flow::Stop {
                self.complete();
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// The body ended. A closed connection is a normal end of reply.
    pub fn finish(&mut self) -> StreamState {
        if self.state.is_terminal() {
            return self.state;
        }
        if let Some(line) = self.decoder.finish() {
            self.apply_line(&line);
        }
        self.complete();
        self.state
    }

    /// Transport failure: the placeholder shows the failure notice instead of
    /// any partial content.
    pub fn fail(&mut self, reason: &dyn Display) -> StreamState {
        if self.state.is_terminal() {
            return self.state;
        }
        warn!("Chat stream failed after {} bytes: {reason}", self.accumulated.len());
        self.accumulated.clear();
        self.state = StreamState::Failed;
        self.sink.fail(STREAM_FAILURE_NOTICE);
        self.state
    }

    /// Reads `body` to the end, or until a completion flag.
    pub async fn consume<St, B, E>(&mut self, body: St) -> StreamState
    where
        St: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        self.open();
        let mut body = std::pin::pin!(body);
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    if self.feed(bytes.as_ref()) == Flow::Stop {
                        return self.state;
                    }
                }
                Err(e) => return self.fail(&e),
            }
        }
        self.finish()
    }

    /// Waits for the response to `opening`, then consumes its body. A failed
    /// opening (connection refused, non-success status) ends in
    /// [`StreamState::Failed`].
    pub async fn run<F, St, B, E, OE>(mut self, opening: F) -> (StreamState, S)
    where
        F: Future<Output = Result<St, OE>>,
        St: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        OE: Display,
    {
        let state = match opening.await {
            Ok(body) => self.consume(body).await,
            Err(e) => self.fail(&e),
        };
        debug!("Chat stream ended in state {state:?} ({} chars)", self.accumulated.len());
        (state, self.sink)
    }

    fn apply_line(&mut self, line: &str) -> Flow {
        let Some(frame) = StreamFrame::parse(line) else {
            return Flow::Continue;
        };
        if let Some(fragment) = frame.fragment() {
            self.accumulated.push_str(fragment);
            self.sink.publish(&self.accumulated);
        }
        let done = frame.is_done();
        if frame.agent.is_some() {
            self.agent = frame.agent;
        }
        if done {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn complete(&mut self) {
        self.state = StreamState::Completed;
        self.sink.complete(self.agent.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[derive(Debug, Default)]
    struct RecordingSink {
        published: Vec<String>,
        completed: bool,
        agent: Option<String>,
        failed_with: Option<String>,
    }

    impl RecordingSink {
        fn shown(&self) -> &str {
            self.failed_with
                .as_deref()
                .or(self.published.last().map(String::as_str))
                .unwrap_or("")
        }
    }

    impl MessageSink for RecordingSink {
        fn publish(&mut self, content: &str) {
            self.published.push(content.to_string());
        }

        fn complete(&mut self, agent: Option<&str>) {
            self.completed = true;
            self.agent = agent.map(str::to_string);
        }

        fn fail(&mut self, notice: &str) {
            self.failed_with = Some(notice.to_string());
        }
    }

    fn feed_all(chunks: &[&[u8]]) -> (StreamState, RecordingSink) {
        let mut consumer = StreamConsumer::new(RecordingSink::default());
        consumer.open();
        for chunk in chunks {
            if consumer.feed(chunk) == Flow::Stop {
                break;
            }
        }
        consumer.finish();
        let state = consumer.state();
        (state, consumer.into_sink())
    }

    const BODY: &str = concat!(
        "data: {\"content\":\"Bonjour\",\"done\":false}\n\n",
        ": keep-alive\n",
        "data: {\"content\":\", voici \",\"done\":false}\n\n",
        "data: {not valid json}\n",
        "data: {\"content\":\"la réponse 🙂\",\"done\":false}\n\n",
        "data: {\"content\":\"\",\"done\":true,\"agent\":\"ollama.qwen2.5\"}\n\n",
    );

    #[test]
    fn content_then_done_completes_with_that_content() {
        let (state, sink) = feed_all(&[b"data: {\"content\":\"X\"}\ndata: {\"done\":true}\n"]);
        assert_eq!(state, StreamState::Completed);
        assert_eq!(sink.shown(), "X");
        assert!(sink.completed);
        assert!(sink.failed_with.is_none());
    }

    #[test]
    fn final_content_is_ordered_concatenation_skipping_malformed_lines() {
        let (state, sink) = feed_all(&[BODY.as_bytes()]);
        assert_eq!(state, StreamState::Completed);
        assert_eq!(sink.shown(), "Bonjour, voici la réponse 🙂");
        assert_eq!(sink.published.len(), 3);
    }

    #[test]
    fn published_content_only_grows() {
        let (_, sink) = feed_all(&[BODY.as_bytes()]);
        for pair in sink.published.windows(2) {
            assert!(pair[1].starts_with(&pair[0]), "{:?} retracted {:?}", pair[1], pair[0]);
            assert!(pair[1].len() > pair[0].len());
        }
    }

    #[test]
    fn malformed_line_alone_has_no_effect() {
        let (state, sink) = feed_all(&[b"data: {not valid json}\n"]);
        assert_eq!(state, StreamState::Completed);
        assert!(sink.published.is_empty());
        assert!(sink.failed_with.is_none());
    }

    #[test]
    fn any_chunk_partition_yields_the_same_content() {
        let body = BODY.as_bytes();
        let (_, whole) = feed_all(&[body]);

        for split in 0..=body.len() {
            let (a, b) = body.split_at(split);
            let (state, sink) = feed_all(&[a, b]);
            assert_eq!(state, StreamState::Completed);
            assert_eq!(sink.shown(), whole.shown(), "split at {split}");
        }

        for size in [1, 2, 3, 5, 7, 13] {
            let chunks: Vec<&[u8]> = body.chunks(size).collect();
            let (_, sink) = feed_all(&chunks);
            assert_eq!(sink.shown(), whole.shown(), "chunk size {size}");
        }
    }

    #[test]
    fn end_of_stream_without_done_still_completes() {
        let (state, sink) = feed_all(&[b"data: {\"content\":\"partiel\"}\n"]);
        assert_eq!(state, StreamState::Completed);
        assert_eq!(sink.shown(), "partiel");
        assert!(sink.completed);
    }

    #[test]
    fn unterminated_last_line_is_processed_at_end_of_stream() {
        let (state, sink) = feed_all(&[b"data: {\"content\":\"a\"}\ndata: {\"content\":\"b\"}"]);
        assert_eq!(state, StreamState::Completed);
        assert_eq!(sink.shown(), "ab");
    }

    #[test]
    fn nothing_after_completion_is_applied() {
        let mut consumer = StreamConsumer::new(RecordingSink::default());
        consumer.open();
        let flow = consumer.feed(b"data: {\"content\":\"fin\",\"done\":true}\ndata: {\"content\":\"!\"}\n");
        assert_eq!(flow, Flow::Stop);
        assert_eq!(consumer.feed(b"data: {\"content\":\"encore\"}\n"), Flow::Stop);
        assert_eq!(consumer.finish(), StreamState::Completed);
        assert_eq!(consumer.content(), "fin");
        assert_eq!(consumer.into_sink().published, vec!["fin"]);
    }

    #[test]
    fn agent_label_is_recorded_without_touching_content() {
        let mut consumer = StreamConsumer::new(RecordingSink::default());
        consumer.feed(b"data: {\"content\":\"ok\"}\ndata: {\"content\":\"\",\"done\":true,\"agent\":\"chat.error\"}\n");
        assert_eq!(consumer.content(), "ok");
        assert_eq!(consumer.into_sink().agent.as_deref(), Some("chat.error"));
    }

    #[test]
    fn completion_hands_the_agent_label_to_the_sink() {
        let (state, sink) = feed_all(&[BODY.as_bytes()]);
        assert_eq!(state, StreamState::Completed);
        assert_eq!(sink.agent.as_deref(), Some("ollama.qwen2.5"));

        let (_, sink) = feed_all(&[b"data: {\"content\":\"sans agent\"}\n"]);
        assert!(sink.completed);
        assert_eq!(sink.agent, None);
    }

    #[tokio::test]
    async fn rejected_request_shows_failure_notice() {
        let consumer = StreamConsumer::new(RecordingSink::default());
        let opening = async {
            Err::<stream::Empty<Result<Vec<u8>, String>>, _>("connection refused".to_string())
        };
        let (state, sink) = consumer.run(opening).await;
        assert_eq!(state, StreamState::Failed);
        assert_eq!(sink.shown(), STREAM_FAILURE_NOTICE);
        assert!(!sink.completed);
    }

    #[tokio::test]
    async fn interrupted_body_replaces_partial_content_with_notice() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: {\"content\":\"moiti".to_vec()),
            Ok(b"\"}\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"data: {\"content\":\"jamais\"}\n".to_vec()),
        ];
        let consumer = StreamConsumer::new(RecordingSink::default());
        let (state, sink) = consumer.run(async { Ok::<_, String>(stream::iter(chunks)) }).await;
        assert_eq!(state, StreamState::Failed);
        assert_eq!(sink.published, vec!["moiti"]);
        assert_eq!(sink.shown(), STREAM_FAILURE_NOTICE);
    }

    #[tokio::test]
    async fn consume_stops_reading_at_completion_flag() {
        let chunks: Vec<Result<&'static [u8], String>> = vec![
            Ok(b"data: {\"content\":\"X\"}\n"),
            Ok(b"data: {\"done\":true}\n"),
            Err("never polled".to_string()),
        ];
        let mut consumer = StreamConsumer::new(RecordingSink::default());
        let state = consumer.consume(stream::iter(chunks)).await;
        assert_eq!(state, StreamState::Completed);
        assert_eq!(consumer.content(), "X");
        assert!(consumer.into_sink().failed_with.is_none());
    }
}
