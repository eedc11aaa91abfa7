//! Viewer session
//!
//! Binds a `FeedReconciler` to a `SubscriptionRouter` for as long as the
//! viewer has the feed open: topic subscriptions follow the loaded reviews,
//! and events are forwarded to the reconciler from a background task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use artsync_shared::{EventEnvelope, Review, Topic};

use crate::error::ClientError;
use crate::feed::{FeedReconciler, LoadOutcome, ScrollPosition};
use crate::source::{FeedFilter, ReviewSource};
use crate::subscriptions::{Handler, Subscription, SubscriptionRouter};

/// Keeps router subscriptions equal to a wanted topic set
struct TopicSync {
    router: Arc<SubscriptionRouter>,
    handler: Handler,
    active: tokio::sync::Mutex<HashMap<Topic, Subscription>>,
}

impl TopicSync {
    /// Every change is attempted even after a failure; the first error is
    /// returned. Topics whose release failed stay active for the next sync.
    async fn sync(&self, wanted: Vec<Topic>) -> Result<(), ClientError> {
        let mut active = self.active.lock().await;
        let mut first_error = None;

        let stale: Vec<Subscription> = active
            .values()
            .filter(|subscription| !wanted.contains(&subscription.topic()))
            .copied()
            .collect();
        for subscription in stale {
            match self.router.unsubscribe(&subscription).await {
                Ok(()) => {
                    active.remove(&subscription.topic());
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        for topic in wanted {
            if active.contains_key(&topic) {
                continue;
            }
            match self.router.subscribe(topic, self.handler.clone()).await {
                Ok(subscription) => {
                    active.insert(topic, subscription);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn release_all(&self) -> Result<(), ClientError> {
        self.sync(Vec::new()).await
    }
}

pub struct FeedSession<S>
where
    S: ReviewSource + 'static,
{
    reconciler: Arc<FeedReconciler<S>>,
    topics: Arc<TopicSync>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S> FeedSession<S>
where
    S: ReviewSource + 'static,
{
    /// Start forwarding events. The session ends when `parent` is cancelled
    /// or `close` is called.
    pub fn start(
        reconciler: Arc<FeedReconciler<S>>,
        router: Arc<SubscriptionRouter>,
        parent: &CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<EventEnvelope>();
        let handler: Handler = Arc::new(move |envelope: &EventEnvelope| {
            // The receiver only goes away once the session is closing
            let _ = tx.send(envelope.clone());
        });
        let topics = Arc::new(TopicSync {
            router,
            handler,
            active: tokio::sync::Mutex::new(HashMap::new()),
        });
        let cancel = parent.child_token();

        let task = tokio::spawn(forward_events(
            rx,
            reconciler.clone(),
            topics.clone(),
            cancel.clone(),
        ));

        Self {
            reconciler,
            topics,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn reconciler(&self) -> &Arc<FeedReconciler<S>> {
        &self.reconciler
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Disposed);
        }
        Ok(())
    }

    pub async fn load_next_page(&self) -> Result<LoadOutcome, ClientError> {
        self.ensure_open()?;
        let outcome = self.reconciler.load_next_page().await?;
        self.sync_topics().await?;
        Ok(outcome)
    }

    pub async fn on_scroll(&self, position: ScrollPosition) -> Result<LoadOutcome, ClientError> {
        self.ensure_open()?;
        let outcome = self.reconciler.on_scroll(position).await?;
        self.sync_topics().await?;
        Ok(outcome)
    }

    /// Switch the feed filter and load its first page
    pub async fn reset(&self, filter: FeedFilter) -> Result<LoadOutcome, ClientError> {
        self.ensure_open()?;
        self.reconciler.reset(filter);
        self.sync_topics().await?;
        self.load_next_page().await
    }

    pub fn snapshot(&self) -> Vec<Review> {
        self.reconciler.snapshot()
    }

    async fn sync_topics(&self) -> Result<(), ClientError> {
        self.topics.sync(self.reconciler.topics()).await
    }

    /// Stop forwarding, release every topic and dispose the feed.
    ///
    /// Safe to call again when releasing a topic failed; only the topics
    /// still held are retried.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Event forwarding task failed");
            }
        }

        self.reconciler.dispose();
        self.topics.release_all().await?;
        tracing::info!("Feed session closed");
        Ok(())
    }
}

async fn forward_events<S>(
    mut rx: mpsc::UnboundedReceiver<EventEnvelope>,
    reconciler: Arc<FeedReconciler<S>>,
    topics: Arc<TopicSync>,
    cancel: CancellationToken,
) where
    S: ReviewSource + 'static,
{
    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = rx.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let outcome = reconciler.on_domain_event(&envelope).await;
        tracing::debug!(event = envelope.event.name(), outcome = ?outcome, "Event applied");

        // Deleted reviews drop out of the feed and their topics with them
        if let Err(e) = topics.sync(reconciler.topics()).await {
            tracing::warn!(error = %e, "Topic sync failed");
        }
    }
}
