//! Domain events
//!
//! Events are change notifications, not state: they carry just enough
//! identity for a viewer to decide what to refetch. They are never
//! persisted and are delivered at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ArtworkId, CommentId, ReviewId, UserId};
use crate::review::Comment;
use crate::topic::Topic;

/// A notification emitted after a write commits
///
/// The serialized `type` tags are the event names viewers listen for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "RatedArtwork", rename_all = "camelCase")]
    RatingChanged { artwork_id: ArtworkId, new_rate: f64 },

    #[serde(rename = "LikedReview", rename_all = "camelCase")]
    ReviewLiked {
        review_id: ReviewId,
        viewer_id: UserId,
        liked: bool,
    },

    #[serde(rename = "ReceiveComment", rename_all = "camelCase")]
    CommentAdded { review_id: ReviewId, comment: Comment },

    #[serde(rename = "RemoveComment", rename_all = "camelCase")]
    CommentRemoved {
        review_id: ReviewId,
        comment_id: CommentId,
    },
}

impl DomainEvent {
    /// The topic this event is broadcast on
    pub fn topic(&self) -> Topic {
        match self {
            DomainEvent::RatingChanged { artwork_id, .. } => Topic::ArtworkRating(*artwork_id),
            DomainEvent::ReviewLiked { review_id, .. } => Topic::ReviewLikes(*review_id),
            DomainEvent::CommentAdded { review_id, .. }
            | DomainEvent::CommentRemoved { review_id, .. } => Topic::ReviewComments(*review_id),
        }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::RatingChanged { .. } => "RatedArtwork",
            DomainEvent::ReviewLiked { .. } => "LikedReview",
            DomainEvent::CommentAdded { .. } => "ReceiveComment",
            DomainEvent::CommentRemoved { .. } => "RemoveComment",
        }
    }

    /// The review this event is about, if it targets a single review
    pub fn review_id(&self) -> Option<ReviewId> {
        match self {
            DomainEvent::RatingChanged { .. } => None,
            DomainEvent::ReviewLiked { review_id, .. }
            | DomainEvent::CommentAdded { review_id, .. }
            | DomainEvent::CommentRemoved { review_id, .. } => Some(*review_id),
        }
    }

    pub fn artwork_id(&self) -> Option<ArtworkId> {
        match self {
            DomainEvent::RatingChanged { artwork_id, .. } => Some(*artwork_id),
            _ => None,
        }
    }
}

/// What a subscribed connection receives for one published event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub topic: Topic,
    pub event: DomainEvent,
    pub published_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            topic: event.topic(),
            event,
            published_at: Utc::now(),
        }
    }
}
