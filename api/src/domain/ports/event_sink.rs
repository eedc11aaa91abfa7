//! Event sink port
//!
//! The outbound half of a viewer's duplex channel. The hub's delivery task
//! for a connection calls `deliver` once per event, in publish order.

use async_trait::async_trait;

use crate::domain::entities::EventEnvelope;
use crate::error::HubError;

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Push one envelope to the remote peer.
    ///
    /// An error means the channel is gone; the hub then drops the connection.
    async fn deliver(&self, envelope: &EventEnvelope) -> Result<(), HubError>;
}
