//! Feed reconciler
//!
//! A viewer-local replica of the highest-marked feed. Pages are merged by
//! review id, so refetching a page or a review never duplicates entries.
//! Pushed events are only hints: the affected reviews are refetched from
//! the data API, never patched from the event payload.
//!
//! At most one fetch runs at a time. Events arriving meanwhile are
//! coalesced and resynced once when that fetch finishes. `reset` and
//! `dispose` bump a generation counter so results of fetches started
//! before them are thrown away.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;

use artsync_shared::{DomainEvent, EventEnvelope, Review, ReviewId, Topic, UserId};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::source::{FeedFilter, ReviewSource};

/// Why a request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Exhausted,
    Disposed,
    NotLoaded,
    NotAtBottom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded {
        page: u32,
        added: usize,
        updated: usize,
        exhausted: bool,
    },
    Skipped(SkipReason),
    /// The feed was reset or disposed while the page was loading
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event touches no loaded review
    Ignored,
    /// Queued behind the running fetch
    Coalesced(usize),
    Refreshed {
        updated: usize,
        removed: usize,
        failed: usize,
    },
    Skipped(SkipReason),
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Idle,
    Loading,
    Exhausted,
    Disposed,
}

/// Scroll metrics of the feed container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollPosition {
    pub fn at_bottom(&self) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height
    }
}

/// Page number and index within the page
type Position = (u32, usize);

struct FeedState {
    replica: HashMap<ReviewId, Review>,
    positions: HashMap<ReviewId, Position>,
    /// Next page to load
    cursor: u32,
    exhausted: bool,
    in_flight: bool,
    pending: HashSet<ReviewId>,
    disposed: bool,
    generation: u64,
    filter: FeedFilter,
}

impl FeedState {
    fn new(filter: FeedFilter, generation: u64) -> Self {
        Self {
            replica: HashMap::new(),
            positions: HashMap::new(),
            cursor: 1,
            exhausted: false,
            in_flight: false,
            pending: HashSet::new(),
            disposed: false,
            generation,
            filter,
        }
    }

    fn is_page_loaded(&self, page: u32) -> bool {
        page >= 1 && (page < self.cursor || (self.exhausted && page == self.cursor))
    }

    /// Last write wins per review id
    fn merge(&mut self, page: u32, reviews: Vec<Review>) -> (usize, usize) {
        let mut added = 0;
        let mut updated = 0;
        for (index, review) in reviews.into_iter().enumerate() {
            self.positions.insert(review.id, (page, index));
            match self.replica.insert(review.id, review) {
                Some(_) => updated += 1,
                None => added += 1,
            }
        }
        (added, updated)
    }

    fn remove(&mut self, review_id: ReviewId) {
        self.replica.remove(&review_id);
        self.positions.remove(&review_id);
    }

    /// Loaded reviews an event may have changed
    fn affected_by(&self, event: &DomainEvent) -> Vec<ReviewId> {
        let mut affected: Vec<ReviewId> = match event {
            DomainEvent::RatingChanged { artwork_id, .. } => self
                .replica
                .values()
                .filter(|review| review.artwork.id == *artwork_id)
                .map(|review| review.id)
                .collect(),
            _ => event
                .review_id()
                .filter(|id| self.replica.contains_key(id))
                .into_iter()
                .collect(),
        };
        affected.sort();
        affected
    }

    /// Hand over coalesced work, or finish the fetch if there is none
    fn take_pending(&mut self) -> Option<Vec<ReviewId>> {
        if self.pending.is_empty() {
            self.in_flight = false;
            return None;
        }
        let mut ids: Vec<ReviewId> = self.pending.drain().collect();
        ids.sort();
        Some(ids)
    }
}

/// Paged, deduplicated feed replica for one viewer
pub struct FeedReconciler<S>
where
    S: ReviewSource,
{
    source: Arc<S>,
    page_size: usize,
    load_timeout: Duration,
    state: Mutex<FeedState>,
}

impl<S> FeedReconciler<S>
where
    S: ReviewSource,
{
    pub fn new(source: Arc<S>, filter: FeedFilter, page_size: usize, load_timeout: Duration) -> Self {
        Self {
            source,
            page_size,
            load_timeout,
            state: Mutex::new(FeedState::new(filter, 0)),
        }
    }

    pub fn from_config(source: Arc<S>, config: &ClientConfig) -> Self {
        let filter = FeedFilter {
            viewer_id: config.viewer_id,
            tag_ids: config.tag_ids.clone(),
        };
        Self::new(source, filter, config.page_size, config.load_timeout)
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
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

    /// Load the page after the last loaded one
    pub async fn load_next_page(&self) -> Result<LoadOutcome, ClientError> {
        let (page, filter, generation) = {
            let mut state = self.state();
            if state.disposed {
                return Ok(LoadOutcome::Skipped(SkipReason::Disposed));
            }
            if state.in_flight {
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
            }
            if state.exhausted {
                return Ok(LoadOutcome::Skipped(SkipReason::Exhausted));
            }
            state.in_flight = true;
            (state.cursor, state.filter.clone(), state.generation)
        };

        self.fetch_page(page, filter, generation, true).await
    }

    /// Re-fetch an already loaded page without moving the cursor
    pub async fn refresh_page(&self, page: u32) -> Result<LoadOutcome, ClientError> {
        let (filter, generation) = {
            let mut state = self.state();
            if state.disposed {
                return Ok(LoadOutcome::Skipped(SkipReason::Disposed));
            }
            if !state.is_page_loaded(page) {
                return Ok(LoadOutcome::Skipped(SkipReason::NotLoaded));
            }
            if state.in_flight {
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
            }
            state.in_flight = true;
            (state.filter.clone(), state.generation)
        };

        self.fetch_page(page, filter, generation, false).await
    }

    /// Runs with `in_flight` already claimed
    async fn fetch_page(
        &self,
        page: u32,
        filter: FeedFilter,
        generation: u64,
        advance: bool,
    ) -> Result<LoadOutcome, ClientError> {
        let fetched = self
            .with_timeout(self.source.highest_marked(&filter, page))
            .await;

        let (outcome, pending) = {
            let mut state = self.state();
            if state.generation != generation {
                tracing::debug!(page = page, "Discarding page loaded for a stale feed");
                return Ok(LoadOutcome::Discarded);
            }

            let outcome = fetched.map(|reviews| {
                let short = reviews.len() < self.page_size;
                let (added, updated) = state.merge(page, reviews);
                if advance {
                    if short {
                        state.exhausted = true;
                    } else {
                        state.cursor += 1;
                    }
                }
                LoadOutcome::Loaded {
                    page,
                    added,
                    updated,
                    exhausted: state.exhausted,
                }
            });
            (outcome, state.take_pending())
        };

        match &outcome {
            Ok(loaded) => tracing::debug!(page = page, outcome = ?loaded, "Feed page merged"),
            Err(e) => tracing::warn!(page = page, error = %e, "Feed page load failed"),
        }

        if let Some(ids) = pending {
            let resynced = self.resync(ids, generation).await;
            tracing::debug!(outcome = ?resynced, "Coalesced resync finished");
        }
        outcome
    }

    /// React to a pushed event by refetching the reviews it touches
    pub async fn on_domain_event(&self, envelope: &EventEnvelope) -> EventOutcome {
        let (ids, generation) = {
            let mut state = self.state();
            if state.disposed {
                return EventOutcome::Skipped(SkipReason::Disposed);
            }
            let affected = state.affected_by(&envelope.event);
            if affected.is_empty() {
                return EventOutcome::Ignored;
            }
            if state.in_flight {
                let count = affected.len();
                state.pending.extend(affected);
                return EventOutcome::Coalesced(count);
            }
            state.in_flight = true;
            (affected, state.generation)
        };

        tracing::debug!(
            event = envelope.event.name(),
            reviews = ids.len(),
            "Resyncing reviews"
        );
        self.resync(ids, generation).await
    }

    /// Refetch reviews one by one until no coalesced work remains.
    /// Runs with `in_flight` already claimed.
    async fn resync(&self, mut ids: Vec<ReviewId>, generation: u64) -> EventOutcome {
        let mut updated = 0;
        let mut removed = 0;
        let mut failed = 0;

        loop {
            let (targets, viewer) = {
                let state = self.state();
                if state.generation != generation {
                    return EventOutcome::Discarded;
                }
                let targets: Vec<(ReviewId, UserId)> = ids
                    .iter()
                    .filter_map(|id| state.replica.get(id).map(|review| (*id, review.user.id)))
                    .collect();
                (targets, state.filter.viewer_id)
            };

            let results = join_all(targets.iter().map(|&(review_id, author_id)| {
                self.with_timeout(self.source.fetch_review(author_id, review_id, viewer))
            }))
            .await;

            let next = {
                let mut state = self.state();
                if state.generation != generation {
                    return EventOutcome::Discarded;
                }
                for ((review_id, _), result) in targets.into_iter().zip(results) {
                    match result {
                        Ok(review) => {
                            if let Some(slot) = state.replica.get_mut(&review_id) {
                                *slot = review;
                                updated += 1;
                            }
                        }
                        Err(ClientError::NotFound(_)) => {
                            state.remove(review_id);
                            removed += 1;
                        }
                        Err(e) => {
                            tracing::warn!(review_id = %review_id, error = %e, "Review refetch failed");
                            failed += 1;
                        }
                    }
                }
                state.take_pending()
            };

            match next {
                Some(more) => ids = more,
                None => break,
            }
        }

        EventOutcome::Refreshed {
            updated,
            removed,
            failed,
        }
    }

    /// Load the next page once the viewer scrolled to the end
    pub async fn on_scroll(&self, position: ScrollPosition) -> Result<LoadOutcome, ClientError> {
        if !position.at_bottom() {
            return Ok(LoadOutcome::Skipped(SkipReason::NotAtBottom));
        }
        self.load_next_page().await
    }

    /// Start over with a new filter; results of running fetches are discarded
    pub fn reset(&self, filter: FeedFilter) {
        let mut state = self.state();
        if state.disposed {
            return;
        }
        let generation = state.generation + 1;
        *state = FeedState::new(filter, generation);
        tracing::debug!(generation = generation, "Feed reset");
    }

    /// Stop the feed for good; results of running fetches are discarded
    pub fn dispose(&self) {
        let mut state = self.state();
        state.disposed = true;
        state.generation += 1;
        state.in_flight = false;
        state.pending.clear();
        state.replica.clear();
        state.positions.clear();
    }

    /// Reviews ordered by mark, highest first, ties in server order
    pub fn snapshot(&self) -> Vec<Review> {
        let state = self.state();
        let mut reviews: Vec<(Position, &Review)> = state
            .replica
            .values()
            .map(|review| {
                let position = state
                    .positions
                    .get(&review.id)
                    .copied()
                    .unwrap_or((u32::MAX, usize::MAX));
                (position, review)
            })
            .collect();
        reviews.sort_by_key(|(position, review)| (Reverse(review.mark), *position));
        reviews.into_iter().map(|(_, review)| review.clone()).collect()
    }

    /// Topics a viewer of the loaded reviews must listen to
    pub fn topics(&self) -> Vec<Topic> {
        let state = self.state();
        let topics: BTreeSet<Topic> = state
            .replica
            .values()
            .flat_map(|review| {
                [
                    Topic::ArtworkRating(review.artwork.id),
                    Topic::ReviewLikes(review.id),
                    Topic::ReviewComments(review.id),
                ]
            })
            .collect();
        topics.into_iter().collect()
    }

    pub fn status(&self) -> FeedStatus {
        let state = self.state();
        if state.disposed {
            FeedStatus::Disposed
        } else if state.in_flight {
            FeedStatus::Loading
        } else if state.exhausted {
            FeedStatus::Exhausted
        } else {
            FeedStatus::Idle
        }
    }

    /// Page the next `load_next_page` will request
    pub fn next_page(&self) -> u32 {
        self.state().cursor
    }

    pub fn filter(&self) -> FeedFilter {
        self.state().filter.clone()
    }

    pub fn len(&self) -> usize {
        self.state().replica.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        liked_envelope, rating_envelope, removed_comment_envelope, review, review_of,
        InMemorySource,
    };
    use artsync_shared::{ArtworkId, TagId};

    const PAGE: usize = 4;

    fn feed(source: &Arc<InMemorySource>) -> FeedReconciler<InMemorySource> {
        FeedReconciler::new(
            source.clone(),
            FeedFilter::default(),
            PAGE,
            Duration::from_millis(200),
        )
    }

    fn source_with(marks: &[i32]) -> (Arc<InMemorySource>, Vec<Review>) {
        let reviews: Vec<Review> = marks.iter().map(|&mark| review(mark)).collect();
        (Arc::new(InMemorySource::new(PAGE, reviews.clone())), reviews)
    }

    fn ids(reviews: &[Review]) -> Vec<ReviewId> {
        reviews.iter().map(|r| r.id).collect()
    }

    // =========================================================================
    // paging
    // =========================================================================

    #[tokio::test]
    async fn full_pages_advance_until_a_short_page() {
        let (source, _) = source_with(&[10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
        let feed = feed(&source);

        let first = feed.load_next_page().await.unwrap();
        assert_eq!(
            first,
            LoadOutcome::Loaded {
                page: 1,
                added: 4,
                updated: 0,
                exhausted: false
            }
        );
        feed.load_next_page().await.unwrap();
        let third = feed.load_next_page().await.unwrap();

        assert_eq!(
            third,
            LoadOutcome::Loaded {
                page: 3,
                added: 2,
                updated: 0,
                exhausted: true
            }
        );
        assert_eq!(feed.status(), FeedStatus::Exhausted);
        assert_eq!(
            feed.load_next_page().await.unwrap(),
            LoadOutcome::Skipped(SkipReason::Exhausted)
        );
        assert_eq!(source.page_calls(), 3);
        assert_eq!(feed.len(), 10);
    }

    #[tokio::test]
    async fn exact_multiple_needs_an_empty_page_to_exhaust() {
        let (source, _) = source_with(&[4, 3, 2, 1]);
        let feed = feed(&source);

        feed.load_next_page().await.unwrap();
        assert_eq!(feed.status(), FeedStatus::Idle);
        let second = feed.load_next_page().await.unwrap();

        assert!(matches!(
            second,
            LoadOutcome::Loaded {
                page: 2,
                added: 0,
                exhausted: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn refreshing_a_page_never_duplicates() {
        let (source, reviews) = source_with(&[9, 8, 7, 6, 5]);
        let feed = feed(&source);
        feed.load_next_page().await.unwrap();
        source.update(reviews[1].id, |r| r.title = "Edited".to_string());

        let refreshed = feed.refresh_page(1).await.unwrap();

        assert_eq!(
            refreshed,
            LoadOutcome::Loaded {
                page: 1,
                added: 0,
                updated: 4,
                exhausted: false
            }
        );
        assert_eq!(feed.len(), 4);
        assert_eq!(feed.next_page(), 2);
        assert_eq!(feed.snapshot()[1].title, "Edited");
        assert_eq!(
            feed.refresh_page(2).await.unwrap(),
            LoadOutcome::Skipped(SkipReason::NotLoaded)
        );
    }

    #[tokio::test]
    async fn review_shifting_between_pages_appears_once() {
        let (source, reviews) = source_with(&[9, 8, 7, 6, 5, 4, 3, 2]);
        let feed = feed(&source);
        feed.load_next_page().await.unwrap();

        // A new top review pushes page 1's last entry onto page 2
        source.insert(review(10));
        feed.load_next_page().await.unwrap();

        // Page 2 now starts with the review already loaded from page 1
        let snapshot = feed.snapshot();
        assert_eq!(snapshot.len(), 7);
        let unique: HashSet<ReviewId> = snapshot.iter().map(|r| r.id).collect();
        assert_eq!(unique.len(), 7);
        assert!(unique.contains(&reviews[3].id));
    }

    #[tokio::test]
    async fn snapshot_orders_by_mark_then_server_order() {
        let (source, reviews) = source_with(&[5, 7, 7, 3]);
        let feed = feed(&source);
        feed.load_next_page().await.unwrap();

        let order = ids(&feed.snapshot());

        assert_eq!(
            order,
            vec![reviews[1].id, reviews[2].id, reviews[0].id, reviews[3].id]
        );
    }

    #[tokio::test]
    async fn failed_load_is_retryable() {
        let (source, _) = source_with(&[3, 2, 1]);
        let feed = feed(&source);
        source.fail_pages(true);

        assert!(matches!(
            feed.load_next_page().await,
            Err(ClientError::Transport(_))
        ));
        assert_eq!(feed.status(), FeedStatus::Idle);
        assert_eq!(feed.next_page(), 1);

        source.fail_pages(false);
        assert!(matches!(
            feed.load_next_page().await.unwrap(),
            LoadOutcome::Loaded { page: 1, .. }
        ));
    }

    #[tokio::test]
    async fn timed_out_load_clears_in_flight() {
        let (source, _) = source_with(&[3, 2, 1]);
        let feed = FeedReconciler::new(
            source.clone(),
            FeedFilter::default(),
            PAGE,
            Duration::from_millis(30),
        );
        source.set_delay(Some(Duration::from_millis(500)));

        assert!(matches!(
            feed.load_next_page().await,
            Err(ClientError::Timeout(_))
        ));
        assert_eq!(feed.status(), FeedStatus::Idle);

        source.set_delay(None);
        assert!(matches!(
            feed.load_next_page().await.unwrap(),
            LoadOutcome::Loaded { page: 1, .. }
        ));
    }

    #[tokio::test]
    async fn concurrent_load_is_skipped_while_in_flight() {
        let (source, _) = source_with(&[8, 7, 6, 5, 4]);
        let feed = Arc::new(feed(&source));
        let gate = source.hold_pages();

        let loading = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_next_page().await })
        };
        source.wait_entered().await;

        assert_eq!(feed.status(), FeedStatus::Loading);
        assert_eq!(
            feed.load_next_page().await.unwrap(),
            LoadOutcome::Skipped(SkipReason::InFlight)
        );
        gate.add_permits(1);

        assert!(matches!(
            loading.await.unwrap().unwrap(),
            LoadOutcome::Loaded { page: 1, added: 4, .. }
        ));
        assert_eq!(source.page_calls(), 1);
    }

    #[tokio::test]
    async fn on_scroll_loads_only_at_bottom() {
        let (source, _) = source_with(&[2, 1]);
        let feed = feed(&source);

        let above = ScrollPosition {
            scroll_top: 100.0,
            client_height: 500.0,
            scroll_height: 900.0,
        };
        let bottom = ScrollPosition {
            scroll_top: 400.0,
            client_height: 500.0,
            scroll_height: 900.0,
        };

        assert_eq!(
            feed.on_scroll(above).await.unwrap(),
            LoadOutcome::Skipped(SkipReason::NotAtBottom)
        );
        assert!(matches!(
            feed.on_scroll(bottom).await.unwrap(),
            LoadOutcome::Loaded { page: 1, .. }
        ));
    }

    // =========================================================================
    // events
    // =========================================================================

    #[tokio::test]
    async fn like_event_refetches_only_that_review() {
        let (source, reviews) = source_with(&[9, 8, 7]);
        let feed = feed(&source);
        feed.load_next_page().await.unwrap();
        source.update(reviews[0].id, |r| {
            r.likes += 1;
            r.liked_by_viewer = true;
        });

        let outcome = feed.on_domain_event(&liked_envelope(reviews[0].id)).await;

        assert_eq!(
            outcome,
            EventOutcome::Refreshed {
                updated: 1,
                removed: 0,
                failed: 0
            }
        );
        assert_eq!(source.fetches(reviews[0].id), 1);
        assert_eq!(source.fetches(reviews[1].id), 0);
        let top = &feed.snapshot()[0];
        assert_eq!(top.likes, reviews[0].likes + 1);
        assert!(top.liked_by_viewer);
    }

    #[tokio::test]
    async fn rating_event_refetches_every_review_of_the_artwork() {
        let artwork = ArtworkId::new();
        let reviews = vec![review_of(artwork, 9), review(8), review_of(artwork, 7)];
        let source = Arc::new(InMemorySource::new(PAGE, reviews.clone()));
        let feed = feed(&source);
        feed.load_next_page().await.unwrap();
        source.update(reviews[0].id, |r| r.artwork.rate = 4.5);
        source.update(reviews[2].id, |r| r.artwork.rate = 4.5);

        let outcome = feed.on_domain_event(&rating_envelope(artwork, 4.5)).await;

        assert_eq!(
            outcome,
            EventOutcome::Refreshed {
                updated: 2,
                removed: 0,
                failed: 0
            }
        );
        assert_eq!(source.fetches(reviews[1].id), 0);
        assert!(feed
            .snapshot()
            .iter()
            .filter(|r| r.artwork.id == artwork)
            .all(|r| r.artwork.rate == 4.5));
    }

    #[tokio::test]
    async fn event_for_unloaded_review_is_ignored() {
        let (source, _) = source_with(&[9]);
        let feed = feed(&source);
        feed.load_next_page().await.unwrap();

        let outcome = feed.on_domain_event(&liked_envelope(ReviewId::new())).await;

        assert_eq!(outcome, EventOutcome::Ignored);
    }

    #[tokio::test]
    async fn deleted_review_leaves_the_feed() {
        let (source, reviews) = source_with(&[9, 8]);
        let feed = feed(&source);
        feed.load_next_page().await.unwrap();
        source.remove(reviews[1].id);

        let outcome = feed
            .on_domain_event(&removed_comment_envelope(reviews[1].id))
            .await;

        assert_eq!(
            outcome,
            EventOutcome::Refreshed {
                updated: 0,
                removed: 1,
                failed: 0
            }
        );
        assert_eq!(ids(&feed.snapshot()), vec![reviews[0].id]);
        assert!(!feed.topics().contains(&Topic::ReviewLikes(reviews[1].id)));
    }

    #[tokio::test]
    async fn events_during_a_load_resync_once_afterwards() {
        let (source, reviews) = source_with(&[9, 8, 7, 6, 5, 4]);
        let feed = Arc::new(feed(&source));
        feed.load_next_page().await.unwrap();
        let gate = source.hold_pages();

        let loading = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_next_page().await })
        };
        source.wait_entered().await;
        for _ in 0..3 {
            assert_eq!(
                feed.on_domain_event(&liked_envelope(reviews[0].id)).await,
                EventOutcome::Coalesced(1)
            );
        }
        feed.on_domain_event(&liked_envelope(reviews[2].id)).await;
        assert_eq!(source.fetches(reviews[0].id), 0);

        gate.add_permits(1);
        loading.await.unwrap().unwrap();

        assert_eq!(source.fetches(reviews[0].id), 1);
        assert_eq!(source.fetches(reviews[2].id), 1);
        assert_eq!(feed.status(), FeedStatus::Exhausted);
    }

    // =========================================================================
    // reset / dispose
    // =========================================================================

    #[tokio::test]
    async fn dispose_discards_in_flight_result() {
        let (source, reviews) = source_with(&[9, 8]);
        let feed = Arc::new(feed(&source));
        let gate = source.hold_pages();

        let loading = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_next_page().await })
        };
        source.wait_entered().await;
        feed.dispose();
        gate.add_permits(1);

        assert_eq!(loading.await.unwrap().unwrap(), LoadOutcome::Discarded);
        assert!(feed.is_empty());
        assert_eq!(feed.status(), FeedStatus::Disposed);
        assert_eq!(
            feed.load_next_page().await.unwrap(),
            LoadOutcome::Skipped(SkipReason::Disposed)
        );
        assert_eq!(
            feed.on_domain_event(&liked_envelope(reviews[0].id)).await,
            EventOutcome::Skipped(SkipReason::Disposed)
        );
    }

    #[tokio::test]
    async fn reset_starts_over_with_the_new_filter() {
        let tagged = {
            let mut r = review(3);
            r.tags.push(artsync_shared::Tag {
                id: TagId(7),
                text: "abstract".to_string(),
            });
            r
        };
        let mut reviews: Vec<Review> = [9, 8, 7, 6, 5].iter().map(|&m| review(m)).collect();
        reviews.push(tagged.clone());
        let source = Arc::new(InMemorySource::new(PAGE, reviews));
        let feed = Arc::new(feed(&source));
        feed.load_next_page().await.unwrap();
        let gate = source.hold_pages();

        let loading = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_next_page().await })
        };
        source.wait_entered().await;
        let filter = FeedFilter {
            viewer_id: None,
            tag_ids: vec![TagId(7)],
        };
        feed.reset(filter.clone());
        gate.add_permits(1);

        assert_eq!(loading.await.unwrap().unwrap(), LoadOutcome::Discarded);
        assert!(feed.is_empty());
        assert_eq!(feed.next_page(), 1);
        assert_eq!(feed.status(), FeedStatus::Idle);

        source.release_pages();
        feed.load_next_page().await.unwrap();
        assert_eq!(ids(&feed.snapshot()), vec![tagged.id]);
        assert_eq!(feed.filter(), filter);
    }

    #[tokio::test]
    async fn topics_cover_loaded_reviews() {
        let (source, reviews) = source_with(&[9]);
        let feed = feed(&source);
        assert!(feed.topics().is_empty());
        feed.load_next_page().await.unwrap();

        let topics = feed.topics();

        assert_eq!(topics.len(), 3);
        assert!(topics.contains(&Topic::ArtworkRating(reviews[0].artwork.id)));
        assert!(topics.contains(&Topic::ReviewLikes(reviews[0].id)));
        assert!(topics.contains(&Topic::ReviewComments(reviews[0].id)));
    }
}
