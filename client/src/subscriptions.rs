//! Client-side subscription routing
//!
//! Many UI components can listen to the same topic over one hub connection.
//! The router keeps the server-side membership equal to the set of topics
//! with at least one local handler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use artsync_shared::{EventEnvelope, Topic};

use crate::error::ClientError;
use crate::source::TopicControl;

/// Callback invoked for every envelope on a subscribed topic
pub type Handler = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// A registered handler; pass back to `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    topic: Topic,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

pub struct SubscriptionRouter {
    control: Arc<dyn TopicControl>,
    handlers: RwLock<HashMap<Topic, Vec<(u64, Handler)>>>,
    /// Serializes server membership changes
    membership: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

impl SubscriptionRouter {
    pub fn new(control: Arc<dyn TopicControl>) -> Self {
        Self {
            control,
            handlers: RwLock::new(HashMap::new()),
            membership: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a handler. The first handler of a topic subscribes the connection.
    pub async fn subscribe(
        &self,
        topic: Topic,
        handler: Handler,
    ) -> Result<Subscription, ClientError> {
        let _membership = self.membership.lock().await;

        let known = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&topic);
        if !known {
            self.control.subscribe(topic).await?;
            tracing::debug!(topic = %topic, "Topic subscribed");
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic)
            .or_default()
            .push((id, handler));

        Ok(Subscription { id, topic })
    }

    /// Remove a handler. The last handler of a topic releases it on the server.
    /// Unknown subscriptions are ignored.
    ///
    /// If the server release fails the handler stays registered, so the same
    /// subscription can be released again later.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), ClientError> {
        let _membership = self.membership.lock().await;

        let last = {
            let mut handlers = self
                .handlers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(entries) = handlers.get_mut(&subscription.topic) else {
                return Ok(());
            };
            let Some(position) = entries.iter().position(|(id, _)| *id == subscription.id) else {
                return Ok(());
            };
            if entries.len() > 1 {
                entries.remove(position);
                return Ok(());
            }
            handlers.remove(&subscription.topic)
        };

        if let Err(e) = self.control.unsubscribe(subscription.topic).await {
            if let Some(entries) = last {
                self.handlers
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(subscription.topic, entries);
            }
            return Err(e);
        }
        tracing::debug!(topic = %subscription.topic, "Topic released");
        Ok(())
    }

    /// Invoke every handler of the envelope's topic, returning how many ran
    pub fn dispatch(&self, envelope: &EventEnvelope) -> usize {
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&envelope.topic)
            .map(|entries| entries.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(envelope);
        }
        handlers.len()
    }

    /// Topics with at least one local handler
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        topics.sort();
        topics
    }
}
