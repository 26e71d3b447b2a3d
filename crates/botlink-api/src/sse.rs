//! Server-sent events decoding.
//!
//! [`SseDecoder`] is an incremental, transport-agnostic parser for the
//! `text/event-stream` format: feed it arbitrary byte chunks and it returns
//! every event completed by that chunk. [`event_stream`] wraps a streaming
//! `reqwest::Response` body with the decoder.
//!
//! Only the `event`, `data`, and `id` fields are interpreted. Comment lines
//! (leading `:`) and `retry` hints are dropped; reconnection timing belongs
//! to the caller.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use crate::error::Error;
use crate::models::CommandStatus;

/// Event name carrying a [`CommandStatus`] payload.
pub const COMMAND_UPDATE_EVENT: &str = "command_update";

const DEFAULT_EVENT_NAME: &str = "message";

/// Boxed stream of decoded events from one SSE connection.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SseEvent, Error>> + Send>>;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `"message"` when the server sent no `event:` field.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Last `id:` value seen in this event, if any.
    pub id: Option<String>,
}

impl SseEvent {
    /// Decode this event as a command update.
    ///
    /// Returns `None` for events with any other name, so callers can skip
    /// heartbeats and unrelated notifications without treating them as
    /// errors.
    pub fn command_update(&self) -> Option<Result<CommandStatus, Error>> {
        if self.event != COMMAND_UPDATE_EVENT {
            return None;
        }
        Some(
            serde_json::from_str(&self.data).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: self.data.clone(),
            }),
        )
    }
}

/// Longest line the decoder buffers while waiting for a line break.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Incremental `text/event-stream` parser.
///
/// Lines may end in `\n`, `\r\n`, or a bare `\r`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Previous line ended in `\r`; a leading `\n` belongs to it.
    skip_lf: bool,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of bytes, returning every event it completes.
    ///
    /// Partial lines (including split multi-byte characters) are buffered
    /// until the rest arrives. A partial line longer than
    /// [`MAX_LINE_BYTES`] is discarded and reported as
    /// [`Error::LineTooLong`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, Error> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            if self.skip_lf {
                match self.buf.first().copied() {
                    None => break,
                    Some(b'\n') => {
                        self.buf.remove(0);
                        self.skip_lf = false;
                    }
                    Some(_) => self.skip_lf = false,
                }
            }

            let Some(pos) = self.buf.iter().position(|&b| b == b'\n' || b == b'\r') else {
                break;
            };
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            self.skip_lf = raw.last() == Some(&b'\r');
            let line = String::from_utf8_lossy(&raw[..pos]);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else {
                self.field(&line);
            }
        }

        if self.buf.len() > MAX_LINE_BYTES {
            self.buf.clear();
            return Err(Error::LineTooLong {
                limit: MAX_LINE_BYTES,
            });
        }
        Ok(events)
    }

    fn field(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }

        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match name {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            "id" => self.id = Some(value.to_owned()),
            _ => tracing::trace!(field = name, "ignoring SSE field"),
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| DEFAULT_EVENT_NAME.to_owned()),
            data,
            id,
        })
    }
}

/// Decode a streaming response body into server-sent events.
///
/// The stream always finishes with exactly one error: the body read or
/// decode failure that stopped it, or [`Error::StreamClosed`] when the
/// server ended the body.
pub fn event_stream(response: reqwest::Response) -> EventStream {
    Box::pin(async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        let mut body = std::pin::pin!(response.bytes_stream());

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            tracing::trace!(bytes = chunk.len(), "SSE chunk");
            for event in decoder.feed(&chunk)? {
                yield event;
            }
        }

        Err::<(), Error>(Error::StreamClosed)?;
    })
}
