//! Server-Sent Events transport
//!
//! Decodes the hub's `text/event-stream` body into envelopes and pumps them
//! into a `SubscriptionRouter`.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use artsync_shared::{ConnectionId, EventEnvelope};

use crate::error::ClientError;
use crate::subscriptions::SubscriptionRouter;

/// Name of the first event on every stream
const CONNECTED_EVENT: &str = "connected";

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` parser
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes, returning every frame they complete
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end).collect();
            if let Some(frame) = parse_block(&String::from_utf8_lossy(&block)) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Index just past the first blank line. Lines end in "\r\n", "\n" or "\r".
fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    let mut line_ended = false;
    let mut i = 0;
    while i < buffer.len() {
        let next = match buffer[i] {
            b'\r' if buffer.get(i + 1) == Some(&b'\n') => Some(i + 2),
            // Could be the first half of a "\r\n" split across chunks
            b'\r' if i + 1 == buffer.len() => return None,
            b'\r' | b'\n' => Some(i + 1),
            _ => None,
        };
        match next {
            Some(end) if line_ended => return Some(end),
            Some(end) => {
                line_ended = true;
                i = end;
            }
            None => {
                line_ended = false;
                i += 1;
            }
        }
    }
    None
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in block.split(|c| c == '\r' || c == '\n') {
        // Comments carry keep-alives
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    data.map(|data| SseFrame { event, data })
}

/// Envelopes arriving on one hub connection
pub struct EventStream {
    chunks: BoxStream<'static, Result<Vec<u8>, ClientError>>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
}

impl EventStream {
    pub fn new(chunks: BoxStream<'static, Result<Vec<u8>, ClientError>>) -> Self {
        Self {
            chunks,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ClientError::from))
                .boxed(),
        )
    }

    async fn next_frame(&mut self) -> Result<Option<SseFrame>, ClientError> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            match self.chunks.next().await {
                Some(chunk) => self.pending.extend(self.decoder.push(&chunk?)),
                None => return Ok(None),
            }
        }
    }

    /// Read the `connected` frame that names this connection
    pub async fn handshake(&mut self) -> Result<ConnectionId, ClientError> {
        match self.next_frame().await? {
            Some(frame) if frame.event.as_deref() == Some(CONNECTED_EVENT) => frame
                .data
                .trim()
                .parse()
                .map_err(|e: uuid::Error| ClientError::Decode(e.to_string())),
            Some(frame) => Err(ClientError::Decode(format!(
                "Expected '{}' event, got {:?}",
                CONNECTED_EVENT, frame.event
            ))),
            None => Err(ClientError::Transport(
                "Stream closed before handshake".to_string(),
            )),
        }
    }

    /// Next envelope, or `None` once the hub closes the stream
    pub async fn next_envelope(&mut self) -> Result<Option<EventEnvelope>, ClientError> {
        match self.next_frame().await? {
            Some(frame) => Ok(Some(serde_json::from_str(&frame.data)?)),
            None => Ok(None),
        }
    }
}

/// Dispatch envelopes until the stream ends or `cancel` fires
pub async fn pump_events(
    mut stream: EventStream,
    router: Arc<SubscriptionRouter>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next_envelope() => next,
        };

        match next {
            Ok(Some(envelope)) => {
                let handled = router.dispatch(&envelope);
                tracing::debug!(
                    topic = %envelope.topic,
                    event = envelope.event.name(),
                    handlers = handled,
                    "Event dispatched"
                );
            }
            Ok(None) => {
                tracing::info!("Hub closed the event stream");
                break;
            }
            Err(ClientError::Decode(e)) => {
                tracing::warn!(error = %e, "Skipping undecodable event");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Event stream failed");
                break;
            }
        }
    }
}
