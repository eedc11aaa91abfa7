//! Client-side ports
//!
//! The reconcilers only see these traits; `api_client` provides the HTTP
//! implementations and tests provide in-memory ones.

use async_trait::async_trait;

use artsync_shared::{Review, ReviewId, TagId, Topic, UserId};

use crate::error::ClientError;

/// What the feed is filtered by
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub viewer_id: Option<UserId>,
    pub tag_ids: Vec<TagId>,
}

/// Read side of the data API
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// One page of the highest-marked feed. Pages are numbered from 1.
    async fn highest_marked(
        &self,
        filter: &FeedFilter,
        page: u32,
    ) -> Result<Vec<Review>, ClientError>;

    /// A single review as seen by `viewer_id`. Deleted reviews are `NotFound`.
    async fn fetch_review(
        &self,
        author_id: UserId,
        review_id: ReviewId,
        viewer_id: Option<UserId>,
    ) -> Result<Review, ClientError>;

    /// Other reviews of the same artwork
    async fn connected_reviews(
        &self,
        author_id: UserId,
        review_id: ReviewId,
        viewer_id: Option<UserId>,
    ) -> Result<Vec<Review>, ClientError>;
}

/// Topic membership of this client's hub connection
#[async_trait]
pub trait TopicControl: Send + Sync {
    async fn subscribe(&self, topic: Topic) -> Result<(), ClientError>;

    async fn unsubscribe(&self, topic: Topic) -> Result<(), ClientError>;
}
