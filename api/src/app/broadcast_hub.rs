//! Event broadcast hub
//!
//! Fans domain events out to every connection subscribed to the event's
//! topic. Nothing is persisted or replayed: `publish` only enqueues, and a
//! dedicated task per connection drains its queue into the connection's sink.
//! Viewers treat every event as a hint to refetch, so a dropped event costs
//! at most one stale view until the next one arrives.

use std::sync::Arc;
use std::time::Duration;

use crate::app::connection_registry::{ConnectionRegistry, DeliveryQueue, Enqueued};
use crate::config::Config;
use crate::domain::entities::{
    ConnectionId, DomainEvent, EventEnvelope, PublishReport, SubscriptionHandle, Topic,
};
use crate::domain::ports::EventSink;
use crate::error::{DomainError, HubError};

/// Hub tuning
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Undelivered events buffered per connection
    pub queue_capacity: usize,
    /// Bound on a single sink delivery
    pub delivery_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for HubConfig {
    fn from(config: &Config) -> Self {
        Self {
            queue_capacity: config.hub_queue_capacity,
            delivery_timeout: config.hub_delivery_timeout,
        }
    }
}

/// In-process pub/sub for domain events
pub struct EventBroadcastHub {
    registry: Arc<ConnectionRegistry>,
    config: HubConfig,
}

impl EventBroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        Self::with_registry(Arc::new(ConnectionRegistry::new()), config)
    }

    pub fn with_registry(registry: Arc<ConnectionRegistry>, config: HubConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Register a new connection and start its delivery task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_connection(&self, sink: Arc<dyn EventSink>) -> ConnectionId {
        let connection_id = ConnectionId::new();
        let queue = Arc::new(DeliveryQueue::new(
            connection_id,
            self.config.queue_capacity,
        ));
        self.registry.register_connection(queue.clone());

        tokio::spawn(run_delivery(
            self.registry.clone(),
            queue,
            sink,
            self.config.delivery_timeout,
        ));

        tracing::info!(connection_id = %connection_id, "Connection opened");
        connection_id
    }

    /// Subscribe a connection to a topic. Idempotent per (connection, topic).
    pub fn subscribe(
        &self,
        connection_id: ConnectionId,
        topic: Topic,
    ) -> Result<SubscriptionHandle, DomainError> {
        if self.registry.register(connection_id, topic)? {
            tracing::debug!(connection_id = %connection_id, topic = %topic, "Subscribed");
        }
        Ok(SubscriptionHandle {
            connection_id,
            topic,
        })
    }

    /// Drop a subscription. Unknown handles are ignored.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = self.registry.deregister(handle.connection_id, handle.topic);
        if removed {
            tracing::debug!(
                connection_id = %handle.connection_id,
                topic = %handle.topic,
                "Unsubscribed"
            );
        }
        removed
    }

    /// Forget a connection and all its subscriptions
    pub fn close_connection(&self, connection_id: ConnectionId) -> bool {
        let closed = self.registry.deregister_connection(connection_id);
        if closed {
            tracing::info!(connection_id = %connection_id, "Connection closed");
        }
        closed
    }

    /// Hand an event to every current subscriber of its topic.
    ///
    /// Never blocks on slow connections; returns once every queue has it.
    pub fn publish(&self, event: DomainEvent) -> PublishReport {
        let envelope = EventEnvelope::new(event);
        let subscribers = self.registry.snapshot(&envelope.topic);

        let mut report = PublishReport {
            topic: envelope.topic,
            recipients: 0,
            dropped: 0,
            skipped: 0,
        };
        for queue in subscribers.iter() {
            match queue.push(envelope.clone()) {
                Enqueued::Queued => report.recipients += 1,
                Enqueued::DroppedOldest => {
                    report.recipients += 1;
                    report.dropped += 1;
                }
                Enqueued::Closed => report.skipped += 1,
            }
        }

        tracing::debug!(
            topic = %report.topic,
            event = envelope.event.name(),
            recipients = report.recipients,
            dropped = report.dropped,
            skipped = report.skipped,
            "Event published"
        );
        report
    }
}

/// Drain one connection's queue into its sink until the queue closes
async fn run_delivery(
    registry: Arc<ConnectionRegistry>,
    queue: Arc<DeliveryQueue>,
    sink: Arc<dyn EventSink>,
    timeout: Duration,
) {
    let connection_id = queue.connection_id();

    while let Some(envelope) = queue.next().await {
        let result = match tokio::time::timeout(timeout, sink.deliver(&envelope)).await {
            Ok(result) => result,
            Err(_) => Err(HubError::Timeout(timeout)),
        };

        if let Err(e) = result {
            tracing::warn!(
                connection_id = %connection_id,
                topic = %envelope.topic,
                error = %e,
                "Delivery failed, closing connection"
            );
            registry.deregister_connection(connection_id);
            break;
        }
    }

    tracing::debug!(connection_id = %connection_id, "Delivery task finished");
}
