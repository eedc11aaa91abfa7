//! EventSink backed by a tokio mpsc channel

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::entities::EventEnvelope;
use crate::domain::ports::EventSink;
use crate::error::HubError;

/// Forwards envelopes to the task streaming them to the viewer
pub struct ChannelSink {
    tx: mpsc::Sender<EventEnvelope>,
}

impl ChannelSink {
    /// Create a sink and the receiver the response stream reads from
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn deliver(&self, envelope: &EventEnvelope) -> Result<(), HubError> {
        self.tx
            .send(envelope.clone())
            .await
            .map_err(|_| HubError::Transport("event stream closed".to_string()))
    }
}
