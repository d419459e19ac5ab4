//! Incremental consumer of an NDJSON data stream
//!
//! Bytes arrive in arbitrary chunks. [`LineDecoder`] reassembles complete
//! lines, each line is parsed into a [`StreamMessage`], checked against the
//! protocol order and handed to a [`FetchObserver`] as soon as it is
//! complete. Nothing waits for the end of the stream.

use futures::{Stream, StreamExt};
use serde_json::Value;
use strata_wire::{ErrorPayload, HeadFields, QueryState, StreamMessage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("malformed line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line} is not valid UTF-8")]
    InvalidUtf8 { line: usize },

    #[error("protocol violation at line {line}: {reason}")]
    Protocol { line: usize, reason: &'static str },

    #[error("stream ended before done")]
    Truncated,

    /// The server answered the data request with a redirect
    #[error("redirected to {0}")]
    Redirect(String),

    #[error("navigation superseded")]
    Superseded,
}

/// Callbacks fired per message, in arrival order
///
/// Every callback defaults to doing nothing.
pub trait FetchObserver {
    fn on_loader(&mut self, _level_id: &str, _data: Option<&Value>) {}
    fn on_head(&mut self, _level_id: Option<&str>, _head: &HeadFields) {}
    fn on_query(&mut self, _queries: &[QueryState]) {}
    fn on_ready(&mut self) {}
    fn on_chunk(&mut self, _level_id: &str, _key: &str, _data: &Value) {}
    fn on_error(&mut self, _level_id: &str, _key: Option<&str>, _error: &ErrorPayload) {}
    fn on_done(&mut self) {}
}

/// Collects every message; handy for tests and simple consumers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectingObserver {
    pub messages: Vec<StreamMessage>,
}

impl FetchObserver for CollectingObserver {
    fn on_loader(&mut self, level_id: &str, data: Option<&Value>) {
        self.messages.push(StreamMessage::Loader {
            level_id: level_id.to_string(),
            data: data.cloned(),
        });
    }

    fn on_head(&mut self, level_id: Option<&str>, head: &HeadFields) {
        self.messages.push(StreamMessage::Head {
            level_id: level_id.map(str::to_string),
            head: head.clone(),
        });
    }

    fn on_query(&mut self, queries: &[QueryState]) {
        self.messages.push(StreamMessage::Query {
            queries: queries.to_vec(),
        });
    }

    fn on_ready(&mut self) {
        self.messages.push(StreamMessage::Ready);
    }

    fn on_chunk(&mut self, level_id: &str, key: &str, data: &Value) {
        self.messages
            .push(StreamMessage::settlement(level_id, key, Ok(data.clone())));
    }

    fn on_error(&mut self, level_id: &str, key: Option<&str>, error: &ErrorPayload) {
        self.messages.push(StreamMessage::Error {
            level_id: level_id.to_string(),
            key: key.map(str::to_string),
            error: error.clone(),
        });
    }

    fn on_done(&mut self) {
        self.messages.push(StreamMessage::Done);
    }
}

/// Reassembles newline-terminated lines from arbitrary byte chunks
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every line it completed, without newlines
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        for pos in self.scanned..self.buffer.len() {
            if self.buffer[pos] != b'\n' {
                continue;
            }
            let mut line = &self.buffer[start..pos];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            if !line.is_empty() {
                lines.push(line.to_vec());
            }
            start = pos + 1;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        lines
    }

    /// Bytes of an unfinished line
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }
}

/// Where the stream is relative to the protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    BeforeReady,
    AfterReady,
    Done,
}

/// Validates ordering and dispatches messages one at a time
#[derive(Debug, Default)]
pub struct MessageDispatcher {
    phase: StreamPhase,
    line: usize,
    saw_query: bool,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Parses and dispatches one complete line
    pub fn dispatch_line<O: FetchObserver + ?Sized>(
        &mut self,
        raw: &[u8],
        observer: &mut O,
    ) -> Result<StreamMessage, FetchError> {
        let message = self.decode_line(raw)?;
        self.dispatch(&message, observer)?;
        Ok(message)
    }

    /// Parses one complete line without dispatching it
    pub fn decode_line(&mut self, raw: &[u8]) -> Result<StreamMessage, FetchError> {
        self.line += 1;
        let line = self.line;
        let text = std::str::from_utf8(raw).map_err(|_| FetchError::InvalidUtf8 { line })?;
        StreamMessage::parse_line(text).map_err(|source| FetchError::Malformed { line, source })
    }

    /// Checks `message` against the protocol order, then dispatches it
    pub fn dispatch<O: FetchObserver + ?Sized>(
        &mut self,
        message: &StreamMessage,
        observer: &mut O,
    ) -> Result<(), FetchError> {
        let line = self.line;
        let violation = |reason| Err(FetchError::Protocol { line, reason });

        if self.phase == StreamPhase::Done {
            return violation("message after done");
        }

        match message {
            StreamMessage::Loader { level_id, data } => {
                if self.phase != StreamPhase::BeforeReady {
                    return violation("loader message after ready");
                }
                observer.on_loader(level_id, data.as_ref());
            }
            StreamMessage::Head { level_id, head } => {
                if self.phase != StreamPhase::BeforeReady {
                    return violation("head message after ready");
                }
                observer.on_head(level_id.as_deref(), head);
            }
            StreamMessage::Query { queries } => {
                if self.phase != StreamPhase::BeforeReady || self.saw_query {
                    return violation("unexpected query message");
                }
                self.saw_query = true;
                observer.on_query(queries);
            }
            StreamMessage::Ready => {
                if self.phase != StreamPhase::BeforeReady {
                    return violation("second ready");
                }
                self.phase = StreamPhase::AfterReady;
                observer.on_ready();
            }
            StreamMessage::Chunk { level_id, key, data } => {
                if self.phase != StreamPhase::AfterReady {
                    return violation("chunk before ready");
                }
                observer.on_chunk(level_id, key, data);
            }
            StreamMessage::Error { level_id, key, error } => {
                if key.is_some() && self.phase != StreamPhase::AfterReady {
                    return violation("deferred error before ready");
                }
                observer.on_error(level_id, key.as_deref(), error);
            }
            StreamMessage::Done => {
                if self.phase != StreamPhase::AfterReady {
                    return violation("done before ready");
                }
                self.phase = StreamPhase::Done;
                observer.on_done();
            }
        }
        Ok(())
    }
}

/// Counts from one consumed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchSummary {
    pub messages: usize,
    pub bytes: usize,
}

/// Consumes a byte stream to the end, dispatching as lines complete
///
/// Returns [`FetchError::Truncated`] when the stream ends before `done`;
/// everything received up to that point has already been dispatched.
pub async fn consume<S, B, E, O>(body: S, observer: &mut O) -> Result<FetchSummary, FetchError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    O: FetchObserver + ?Sized,
{
    futures::pin_mut!(body);

    let mut decoder = LineDecoder::new();
    let mut dispatcher = MessageDispatcher::new();
    let mut summary = FetchSummary::default();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| FetchError::Transport(err.to_string()))?;
        let bytes = chunk.as_ref();
        summary.bytes += bytes.len();

        for line in decoder.push(bytes) {
            dispatcher.dispatch_line(&line, observer)?;
            summary.messages += 1;
        }
    }

    if !decoder.remainder().is_empty() {
        tracing::warn!("Data stream ended mid-line ({} bytes)", decoder.remainder().len());
    }

    match dispatcher.phase() {
        StreamPhase::Done => Ok(summary),
        _ => Err(FetchError::Truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"t\":").is_empty());
        let lines = decoder.push(b"\"r\"}\n{\"t\":\"d\"}\r\n{\"t\"");
        assert_eq!(lines, vec![b"{\"t\":\"r\"}".to_vec(), b"{\"t\":\"d\"}".to_vec()]);
        assert_eq!(decoder.remainder(), b"{\"t\"");
    }

    #[test]
    fn test_long_line_over_many_chunks() {
        let mut decoder = LineDecoder::new();
        let line = format!("{{\"t\":\"l\",\"k\":\"{}\"}}", "x".repeat(4096));

        for chunk in line.as_bytes().chunks(7) {
            assert!(decoder.push(chunk).is_empty());
        }
        assert_eq!(decoder.remainder().len(), line.len());

        let lines = decoder.push(b"\n{\"t\":\"r\"}\n");
        assert_eq!(lines, vec![line.into_bytes(), b"{\"t\":\"r\"}".to_vec()]);
        assert!(decoder.remainder().is_empty());
    }

    #[test]
    fn test_order_violations_are_rejected() {
        let mut observer = CollectingObserver::default();

        let mut dispatcher = MessageDispatcher::new();
        let chunk = StreamMessage::settlement("p", "k", Ok(Value::Null));
        assert!(matches!(
            dispatcher.dispatch(&chunk, &mut observer),
            Err(FetchError::Protocol { .. })
        ));

        let mut dispatcher = MessageDispatcher::new();
        dispatcher.dispatch(&StreamMessage::Ready, &mut observer).unwrap();
        let loader = StreamMessage::Loader {
            level_id: "p".into(),
            data: None,
        };
        assert!(dispatcher.dispatch(&loader, &mut observer).is_err());
        dispatcher.dispatch(&StreamMessage::Done, &mut observer).unwrap();
        assert!(dispatcher.dispatch(&StreamMessage::Done, &mut observer).is_err());
    }

    #[test]
    fn test_level_error_before_ready_is_allowed() {
        let mut observer = CollectingObserver::default();
        let mut dispatcher = MessageDispatcher::new();
        let error = StreamMessage::Error {
            level_id: "".into(),
            key: None,
            error: ErrorPayload::new("encoder failed"),
        };
        dispatcher.dispatch(&error, &mut observer).unwrap();
        assert_eq!(observer.messages.len(), 1);
    }
}
