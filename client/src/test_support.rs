//! In-memory ports and fixtures for client tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Notify, Semaphore};

use artsync_shared::{
    ArtworkId, ArtworkSummary, Comment, CommentId, DomainEvent, EventEnvelope, GroupId,
    GroupSummary, Review, ReviewId, Topic, UserId, UserSummary,
};

use crate::error::ClientError;
use crate::source::{FeedFilter, ReviewSource, TopicControl};

// ============================================================================
// Fixtures
// ============================================================================

/// A review of a fresh artwork
pub fn review(mark: i32) -> Review {
    review_of(ArtworkId::new(), mark)
}

pub fn review_of(artwork_id: ArtworkId, mark: i32) -> Review {
    Review {
        id: ReviewId::new(),
        user: UserSummary {
            id: UserId::new(),
            user_name: "critic".to_string(),
        },
        artwork: ArtworkSummary {
            id: artwork_id,
            name: "Composition VIII".to_string(),
            rate: 3.0,
        },
        group: GroupSummary {
            id: GroupId::new(),
            name: "Painting".to_string(),
        },
        title: format!("Review marked {}", mark),
        text: "Bold colours.".to_string(),
        mark,
        likes: 0,
        liked_by_viewer: false,
        images: Vec::new(),
        tags: Vec::new(),
        comments: Vec::new(),
        date_created: Utc::now(),
    }
}

pub fn liked_envelope(review_id: ReviewId) -> EventEnvelope {
    EventEnvelope::new(DomainEvent::ReviewLiked {
        review_id,
        viewer_id: UserId::new(),
        liked: true,
    })
}

pub fn rating_envelope(artwork_id: ArtworkId, new_rate: f64) -> EventEnvelope {
    EventEnvelope::new(DomainEvent::RatingChanged {
        artwork_id,
        new_rate,
    })
}

pub fn comment_envelope(review_id: ReviewId) -> EventEnvelope {
    EventEnvelope::new(DomainEvent::CommentAdded {
        review_id,
        comment: Comment {
            id: CommentId::new(),
            review_id,
            user_id: UserId::new(),
            text: "Agreed".to_string(),
            created_at: Utc::now(),
        },
    })
}

pub fn removed_comment_envelope(review_id: ReviewId) -> EventEnvelope {
    EventEnvelope::new(DomainEvent::CommentRemoved {
        review_id,
        comment_id: CommentId::new(),
    })
}

// ============================================================================
// In-Memory Review Source
// ============================================================================

/// Serves reviews in mark order, like the highest-marked endpoint
pub struct InMemorySource {
    page_size: usize,
    reviews: Mutex<Vec<Review>>,
    page_calls: AtomicUsize,
    fetches: Mutex<HashMap<ReviewId, usize>>,
    fail_pages: AtomicBool,
    delay: Mutex<Option<Duration>>,
    page_gate: Mutex<Option<Arc<Semaphore>>>,
    entered: Notify,
}

impl InMemorySource {
    pub fn new(page_size: usize, reviews: Vec<Review>) -> Self {
        Self {
            page_size,
            reviews: Mutex::new(reviews),
            page_calls: AtomicUsize::new(0),
            fetches: Mutex::new(HashMap::new()),
            fail_pages: AtomicBool::new(false),
            delay: Mutex::new(None),
            page_gate: Mutex::new(None),
            entered: Notify::new(),
        }
    }

    pub fn insert(&self, review: Review) {
        self.reviews.lock().unwrap().push(review);
    }

    pub fn update(&self, review_id: ReviewId, change: impl FnOnce(&mut Review)) {
        let mut reviews = self.reviews.lock().unwrap();
        let review = reviews.iter_mut().find(|r| r.id == review_id).unwrap();
        change(review);
    }

    pub fn remove(&self, review_id: ReviewId) {
        self.reviews.lock().unwrap().retain(|r| r.id != review_id);
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    /// Single-review fetches of `review_id` so far
    pub fn fetches(&self, review_id: ReviewId) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(&review_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_pages(&self, fail: bool) {
        self.fail_pages.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Park page loads until permits are added to the returned gate
    pub fn hold_pages(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.page_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn release_pages(&self) {
        *self.page_gate.lock().unwrap() = None;
    }

    /// Wait until a page load is parked on the gate
    pub async fn wait_entered(&self) {
        tokio::time::timeout(Duration::from_secs(2), self.entered.notified())
            .await
            .expect("no page load reached the gate");
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ReviewSource for InMemorySource {
    async fn highest_marked(
        &self,
        filter: &FeedFilter,
        page: u32,
    ) -> Result<Vec<Review>, ClientError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.page_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.entered.notify_one();
            let _permit = gate.acquire().await.unwrap();
        }
        self.simulate_latency().await;
        if self.fail_pages.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".to_string()));
        }

        let mut reviews: Vec<Review> = self
            .reviews
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                filter.tag_ids.is_empty() || r.tags.iter().any(|t| filter.tag_ids.contains(&t.id))
            })
            .cloned()
            .collect();
        reviews.sort_by_key(|r| std::cmp::Reverse(r.mark));

        let start = (page.saturating_sub(1) as usize) * self.page_size;
        Ok(reviews
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect())
    }

    async fn fetch_review(
        &self,
        _author_id: UserId,
        review_id: ReviewId,
        _viewer_id: Option<UserId>,
    ) -> Result<Review, ClientError> {
        *self.fetches.lock().unwrap().entry(review_id).or_default() += 1;
        self.simulate_latency().await;

        self.reviews
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == review_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("review {}", review_id)))
    }

    async fn connected_reviews(
        &self,
        _author_id: UserId,
        review_id: ReviewId,
        _viewer_id: Option<UserId>,
    ) -> Result<Vec<Review>, ClientError> {
        let reviews = self.reviews.lock().unwrap();
        let artwork = reviews
            .iter()
            .find(|r| r.id == review_id)
            .map(|r| r.artwork.id)
            .ok_or_else(|| ClientError::NotFound(format!("review {}", review_id)))?;

        Ok(reviews
            .iter()
            .filter(|r| r.artwork.id == artwork && r.id != review_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Recording Topic Control
// ============================================================================

/// Records server membership calls
#[derive(Default)]
pub struct RecordingControl {
    subscribed: Mutex<Vec<Topic>>,
    unsubscribed: Mutex<Vec<Topic>>,
    failing: bool,
    /// Unsubscribe calls still to fail before they start succeeding
    unsubscribe_failures: AtomicUsize,
}

impl RecordingControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call fails as if the hub were unreachable
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            ..Self::default()
        })
    }

    /// The first `count` unsubscribe calls fail, later ones succeed
    pub fn failing_unsubscribes(count: usize) -> Arc<Self> {
        Arc::new(Self {
            unsubscribe_failures: AtomicUsize::new(count),
            ..Self::default()
        })
    }

    pub fn subscribed(&self) -> Vec<Topic> {
        self.subscribed.lock().unwrap().clone()
    }

    pub fn unsubscribed(&self) -> Vec<Topic> {
        self.unsubscribed.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.failing {
            return Err(ClientError::Transport("hub unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TopicControl for RecordingControl {
    async fn subscribe(&self, topic: Topic) -> Result<(), ClientError> {
        self.check()?;
        self.subscribed.lock().unwrap().push(topic);
        Ok(())
    }

    async fn unsubscribe(&self, topic: Topic) -> Result<(), ClientError> {
        self.check()?;
        let failing = self
            .unsubscribe_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::Transport("connection reset".to_string()));
        }
        self.unsubscribed.lock().unwrap().push(topic);
        Ok(())
    }
}
