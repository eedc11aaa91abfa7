//! Mock implementations of port traits
//!
//! In-memory sinks and repositories that tests can configure and inspect.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

use crate::adapters::InMemoryTagRepository;
use crate::domain::entities::{EventEnvelope, Tag, TagId};
use crate::domain::ports::{EventSink, TagRepository};
use crate::error::{DomainError, HubError};

// ============================================================================
// Recording Sink
// ============================================================================

/// Records every envelope it is handed
#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<EventEnvelope>>,
    notify: Notify,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn received(&self) -> Vec<EventEnvelope> {
        self.received.lock().unwrap().clone()
    }

    /// Wait until at least `count` envelopes arrived
    pub async fn wait_for(&self, count: usize) -> Vec<EventEnvelope> {
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let notified = self.notify.notified();
                let received = self.received();
                if received.len() >= count {
                    return received;
                }
                notified.await;
            }
        })
        .await;

        match waited {
            Ok(received) => received,
            Err(_) => panic!(
                "expected {} envelopes, got {}",
                count,
                self.received().len()
            ),
        }
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, envelope: &EventEnvelope) -> Result<(), HubError> {
        self.received.lock().unwrap().push(envelope.clone());
        self.notify.notify_waiters();
        Ok(())
    }
}

// ============================================================================
// Gated Sink
// ============================================================================

/// Holds every delivery until `open` is called, then records
pub struct GatedSink {
    entered: Notify,
    gate: Semaphore,
    recording: Arc<RecordingSink>,
}

impl GatedSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            gate: Semaphore::new(0),
            recording: RecordingSink::new(),
        })
    }

    /// Wait until a delivery is parked on the gate
    pub async fn wait_entered(&self) {
        tokio::time::timeout(Duration::from_secs(2), self.entered.notified())
            .await
            .expect("no delivery reached the gate");
    }

    pub fn open(&self) {
        self.gate.add_permits(1);
    }

    pub fn recording(&self) -> &RecordingSink {
        &self.recording
    }
}

#[async_trait]
impl EventSink for GatedSink {
    async fn deliver(&self, envelope: &EventEnvelope) -> Result<(), HubError> {
        self.entered.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| HubError::Transport(e.to_string()))?;
        self.recording.deliver(envelope).await
    }
}

// ============================================================================
// Failing / Slow Sinks
// ============================================================================

/// Every delivery fails as if the client went away
pub struct FailingSink;

#[async_trait]
impl EventSink for FailingSink {
    async fn deliver(&self, _envelope: &EventEnvelope) -> Result<(), HubError> {
        Err(HubError::Transport("connection reset".to_string()))
    }
}

/// Every delivery takes the given time
pub struct SlowSink(pub Duration);

#[async_trait]
impl EventSink for SlowSink {
    async fn deliver(&self, _envelope: &EventEnvelope) -> Result<(), HubError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

// ============================================================================
// Flaky Tag Repository
// ============================================================================

/// In-memory tags whose `create` fails for one label
pub struct FlakyTagRepository {
    inner: InMemoryTagRepository,
    failing_label: String,
}

impl FlakyTagRepository {
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a str>, failing_label: &str) -> Self {
        Self {
            inner: InMemoryTagRepository::with_labels(labels),
            failing_label: failing_label.to_string(),
        }
    }
}

#[async_trait]
impl TagRepository for FlakyTagRepository {
    async fn find_by_id(&self, id: TagId) -> Result<Option<Tag>, DomainError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_label(&self, label: &str) -> Result<Option<Tag>, DomainError> {
        self.inner.find_by_label(label).await
    }

    async fn find_by_ids(&self, ids: &[TagId]) -> Result<Vec<Tag>, DomainError> {
        self.inner.find_by_ids(ids).await
    }

    async fn create(&self, label: &str) -> Result<Tag, DomainError> {
        if label == self.failing_label {
            return Err(DomainError::Internal("tag store unavailable".to_string()));
        }
        self.inner.create(label).await
    }

    async fn list(&self) -> Result<Vec<Tag>, DomainError> {
        self.inner.list().await
    }
}
