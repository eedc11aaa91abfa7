//! Subscription bookkeeping
//!
//! A subscription is the pair (connection, topic). Handles are plain values;
//! unsubscribing with a stale handle is a no-op.

use serde::{Deserialize, Serialize};

use super::{ConnectionId, Topic};

/// Returned by `subscribe`; pass back to `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionHandle {
    pub connection_id: ConnectionId,
    pub topic: Topic,
}

/// Outcome of handing one event to the subscribers of its topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub topic: Topic,
    /// Connections the event was enqueued for
    pub recipients: usize,
    /// Older events evicted from saturated queues to make room
    pub dropped: usize,
    /// Connections that closed between the snapshot and the enqueue
    pub skipped: usize,
}
