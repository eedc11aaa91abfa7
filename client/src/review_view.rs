//! Single review page
//!
//! Watches one review and the other reviews of its artwork. Any rating,
//! like or comment event for the review (or its artwork) triggers a refetch
//! of the review, with the same one-fetch-at-a-time, coalescing and
//! generation rules as the feed.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use artsync_shared::{EventEnvelope, Review, ReviewId, Topic, UserId};

use crate::error::ClientError;
use crate::feed::SkipReason;
use crate::source::ReviewSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Loaded { connected: usize },
    Refreshed,
    /// The review no longer exists
    Removed,
    Ignored,
    Coalesced,
    /// The refetch failed; the last known review is kept
    Failed,
    Skipped(SkipReason),
    Discarded,
}

#[derive(Default)]
struct WatchState {
    review: Option<Review>,
    connected: Vec<Review>,
    removed: bool,
    in_flight: bool,
    pending: bool,
    disposed: bool,
    generation: u64,
}

impl WatchState {
    fn apply(&mut self, fetched: Result<Review, ClientError>) -> WatchOutcome {
        match fetched {
            Ok(review) => {
                self.review = Some(review);
                WatchOutcome::Refreshed
            }
            Err(ClientError::NotFound(_)) => {
                self.review = None;
                self.connected.clear();
                self.removed = true;
                WatchOutcome::Removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Review refetch failed");
                WatchOutcome::Failed
            }
        }
    }

    /// Clears `in_flight` unless coalesced work remains
    fn take_pending(&mut self) -> bool {
        if self.pending && !self.removed {
            self.pending = false;
            return true;
        }
        self.pending = false;
        self.in_flight = false;
        false
    }
}

pub struct ReviewWatcher<S>
where
    S: ReviewSource,
{
    source: Arc<S>,
    author_id: UserId,
    review_id: ReviewId,
    viewer_id: Option<UserId>,
    load_timeout: Duration,
    state: Mutex<WatchState>,
}

impl<S> ReviewWatcher<S>
where
    S: ReviewSource,
{
    pub fn new(
        source: Arc<S>,
        author_id: UserId,
        review_id: ReviewId,
        viewer_id: Option<UserId>,
        load_timeout: Duration,
    ) -> Self {
        Self {
            source,
            author_id,
            review_id,
            viewer_id,
            load_timeout,
            state: Mutex::new(WatchState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn with_timeout<T>(
        &self,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        tokio::time::timeout(self.load_timeout, request)
            .await
            .map_err(|_| ClientError::Timeout(self.load_timeout))?
    }

    async fn fetch(&self) -> Result<Review, ClientError> {
        self.with_timeout(
            self.source
                .fetch_review(self.author_id, self.review_id, self.viewer_id),
        )
        .await
    }

    /// Fetch the review together with its connected reviews
    pub async fn load(&self) -> Result<WatchOutcome, ClientError> {
        let generation = {
            let mut state = self.state();
            if state.disposed {
                return Ok(WatchOutcome::Skipped(SkipReason::Disposed));
            }
            if state.in_flight {
                return Ok(WatchOutcome::Skipped(SkipReason::InFlight));
            }
            state.in_flight = true;
            state.generation
        };

        let (review, connected) = tokio::join!(
            self.fetch(),
            self.with_timeout(self.source.connected_reviews(
                self.author_id,
                self.review_id,
                self.viewer_id
            )),
        );

        let (outcome, again) = {
            let mut state = self.state();
            if state.generation != generation {
                return Ok(WatchOutcome::Discarded);
            }
            let outcome = match review {
                Ok(review) => {
                    state.review = Some(review);
                    state.removed = false;
                    match connected {
                        Ok(connected) => state.connected = connected,
                        Err(e) => tracing::warn!(error = %e, "Connected reviews unavailable"),
                    }
                    Ok(WatchOutcome::Loaded {
                        connected: state.connected.len(),
                    })
                }
                Err(e @ ClientError::NotFound(_)) => Ok(state.apply(Err(e))),
                Err(e) => Err(e),
            };
            (outcome, state.take_pending())
        };

        if again {
            self.refresh(generation).await;
        }
        outcome
    }

    /// Refetch the review if the event concerns it
    pub async fn on_domain_event(&self, envelope: &EventEnvelope) -> WatchOutcome {
        let generation = {
            let mut state = self.state();
            if state.disposed {
                return WatchOutcome::Skipped(SkipReason::Disposed);
            }
            if state.removed || !self.concerns(&state, envelope) {
                return WatchOutcome::Ignored;
            }
            if state.in_flight {
                state.pending = true;
                return WatchOutcome::Coalesced;
            }
            state.in_flight = true;
            state.generation
        };

        self.refresh(generation).await
    }

    fn concerns(&self, state: &WatchState, envelope: &EventEnvelope) -> bool {
        if envelope.event.review_id() == Some(self.review_id) {
            return true;
        }
        match (envelope.event.artwork_id(), &state.review) {
            (Some(artwork_id), Some(review)) => review.artwork.id == artwork_id,
            _ => false,
        }
    }

    /// Runs with `in_flight` already claimed
    async fn refresh(&self, generation: u64) -> WatchOutcome {
        loop {
            let fetched = self.fetch().await;

            let (outcome, again) = {
                let mut state = self.state();
                if state.generation != generation {
                    return WatchOutcome::Discarded;
                }
                let outcome = state.apply(fetched);
                (outcome, state.take_pending())
            };

            if !again {
                return outcome;
            }
        }
    }

    /// Topics this page must listen to
    pub fn topics(&self) -> Vec<Topic> {
        let state = self.state();
        let mut topics = vec![
            Topic::ReviewLikes(self.review_id),
            Topic::ReviewComments(self.review_id),
        ];
        if let Some(review) = &state.review {
            topics.push(Topic::ArtworkRating(review.artwork.id));
        }
        topics
    }

    pub fn review(&self) -> Option<Review> {
        self.state().review.clone()
    }

    pub fn connected(&self) -> Vec<Review> {
        self.state().connected.clone()
    }

    pub fn dispose(&self) {
        let mut state = self.state();
        state.disposed = true;
        state.generation += 1;
        state.in_flight = false;
        state.pending = false;
        state.review = None;
        state.connected.clear();
    }
}
