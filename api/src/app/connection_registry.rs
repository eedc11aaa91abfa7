//! Connection registry
//!
//! Tracks live connections and, per topic, which connections subscribe to it.
//! Topic subscriber lists are copy-on-write: a publisher clones the `Arc`
//! under a short read lock and iterates without holding any lock, so
//! concurrent (de)registration never tears the set it is walking.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Notify;

use crate::domain::entities::{ConnectionId, EventEnvelope, Topic};
use crate::error::DomainError;

/// Result of pushing an envelope onto a delivery queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Queue was full; the oldest undelivered envelope was evicted
    DroppedOldest,
    /// Connection closed; nothing was queued
    Closed,
}

/// Bounded FIFO of envelopes waiting to be delivered to one connection
///
/// Exactly one delivery task consumes a queue, which keeps per-connection
/// delivery in publish order.
pub struct DeliveryQueue {
    connection_id: ConnectionId,
    capacity: usize,
    pending: Mutex<VecDeque<EventEnvelope>>,
    ready: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl DeliveryQueue {
    pub fn new(connection_id: ConnectionId, capacity: usize) -> Self {
        Self {
            connection_id,
            capacity: capacity.max(1),
            pending: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Enqueue without blocking. Evicts the oldest envelope when full.
    pub fn push(&self, envelope: EventEnvelope) -> Enqueued {
        if self.is_closed() {
            return Enqueued::Closed;
        }

        let evicted = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let evicted = if pending.len() >= self.capacity {
                pending.pop_front()
            } else {
                None
            };
            pending.push_back(envelope);
            evicted
        };
        self.ready.notify_one();

        match evicted {
            Some(old) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    connection_id = %self.connection_id,
                    topic = %old.topic,
                    event = old.event.name(),
                    "Delivery queue saturated, dropped oldest event"
                );
                Enqueued::DroppedOldest
            }
            None => Enqueued::Queued,
        }
    }

    /// Wait for the next envelope. Returns `None` once the queue is closed.
    pub async fn next(&self) -> Option<EventEnvelope> {
        loop {
            if self.is_closed() {
                return None;
            }
            let next = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            if next.is_some() {
                return next;
            }
            self.ready.notified().await;
        }
    }

    /// Close the queue and discard anything still pending
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            self.ready.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total envelopes evicted because the queue was saturated
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

type Subscribers = Arc<Vec<Arc<DeliveryQueue>>>;

/// Live connections and their topic subscriptions
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<DeliveryQueue>>>,
    topics: RwLock<HashMap<Topic, Subscribers>>,
}

// Every write leaves the maps consistent, so a poisoned lock still guards valid data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns false if the id was already registered.
    pub fn register_connection(&self, queue: Arc<DeliveryQueue>) -> bool {
        let mut connections = write(&self.connections);
        if connections.contains_key(&queue.connection_id()) {
            return false;
        }
        connections.insert(queue.connection_id(), queue);
        true
    }

    pub fn connection(&self, connection_id: ConnectionId) -> Option<Arc<DeliveryQueue>> {
        read(&self.connections).get(&connection_id).cloned()
    }

    pub fn connection_count(&self) -> usize {
        read(&self.connections).len()
    }

    /// Subscribe a connection to a topic.
    ///
    /// Returns `Ok(false)` if it was already subscribed.
    pub fn register(&self, connection_id: ConnectionId, topic: Topic) -> Result<bool, DomainError> {
        let not_found = || DomainError::NotFound(format!("Connection {}", connection_id));
        let queue = self.connection(connection_id).ok_or_else(not_found)?;

        let mut topics = write(&self.topics);
        // deregister_connection closes the queue before purging topics
        if queue.is_closed() {
            return Err(not_found());
        }

        let current = topics.get(&topic);
        if current.is_some_and(|subs| subs.iter().any(|q| q.connection_id() == connection_id)) {
            return Ok(false);
        }

        let mut next: Vec<_> = current.map(|subs| subs.as_ref().clone()).unwrap_or_default();
        next.push(queue);
        topics.insert(topic, Arc::new(next));
        Ok(true)
    }

    /// Unsubscribe a connection from a topic. Returns false if it was not subscribed.
    pub fn deregister(&self, connection_id: ConnectionId, topic: Topic) -> bool {
        let mut topics = write(&self.topics);
        let Some(current) = topics.get(&topic) else {
            return false;
        };
        if !current.iter().any(|q| q.connection_id() == connection_id) {
            return false;
        }

        let next: Vec<_> = current
            .iter()
            .filter(|q| q.connection_id() != connection_id)
            .cloned()
            .collect();
        if next.is_empty() {
            topics.remove(&topic);
        } else {
            topics.insert(topic, Arc::new(next));
        }
        true
    }

    /// Remove a connection from every topic and close its queue.
    ///
    /// Returns false if the connection was unknown.
    pub fn deregister_connection(&self, connection_id: ConnectionId) -> bool {
        let Some(queue) = write(&self.connections).remove(&connection_id) else {
            return false;
        };
        queue.close();

        let mut topics = write(&self.topics);
        let affected: Vec<Topic> = topics
            .iter()
            .filter(|(_, subs)| subs.iter().any(|q| q.connection_id() == connection_id))
            .map(|(topic, _)| *topic)
            .collect();
        for topic in affected {
            let remaining: Vec<_> = topics[&topic]
                .iter()
                .filter(|q| q.connection_id() != connection_id)
                .cloned()
                .collect();
            if remaining.is_empty() {
                topics.remove(&topic);
            } else {
                topics.insert(topic, Arc::new(remaining));
            }
        }
        true
    }

    /// Subscriber queues of a topic as of now
    pub fn snapshot(&self, topic: &Topic) -> Subscribers {
        read(&self.topics).get(topic).cloned().unwrap_or_default()
    }

    pub fn list_subscribers(&self, topic: &Topic) -> Vec<ConnectionId> {
        self.snapshot(topic)
            .iter()
            .map(|q| q.connection_id())
            .collect()
    }

    /// Topics a connection is subscribed to, sorted
    pub fn topics_for(&self, connection_id: ConnectionId) -> Vec<Topic> {
        let mut topics: Vec<Topic> = read(&self.topics)
            .iter()
            .filter(|(_, subs)| subs.iter().any(|q| q.connection_id() == connection_id))
            .map(|(topic, _)| *topic)
            .collect();
        topics.sort();
        topics
    }
}
