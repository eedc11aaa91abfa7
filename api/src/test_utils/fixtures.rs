//! Test fixtures
//!
//! Factory functions for events and labels with sensible defaults.

use std::time::Duration;

use chrono::Utc;

use crate::domain::entities::{ArtworkId, Comment, CommentId, DomainEvent, ReviewId, UserId};

/// A like toggled on `review_id` by a fresh viewer
pub fn liked_event(review_id: ReviewId, liked: bool) -> DomainEvent {
    DomainEvent::ReviewLiked {
        review_id,
        viewer_id: UserId::new(),
        liked,
    }
}

/// An artwork's average rating moved to `new_rate`
pub fn rating_event(artwork_id: ArtworkId, new_rate: f64) -> DomainEvent {
    DomainEvent::RatingChanged {
        artwork_id,
        new_rate,
    }
}

/// A comment posted on `review_id`
pub fn comment_added_event(review_id: ReviewId) -> DomainEvent {
    DomainEvent::CommentAdded {
        review_id,
        comment: test_comment(review_id),
    }
}

pub fn test_comment(review_id: ReviewId) -> Comment {
    Comment {
        id: CommentId::new(),
        review_id,
        user_id: UserId::new(),
        text: "Lovely brushwork".to_string(),
        created_at: Utc::now(),
    }
}

/// Owned labels from string literals
pub fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
