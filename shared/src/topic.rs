//! Broadcast topics
//!
//! One topic per concern: the rating of an artwork, the likes of a review
//! and the comments of a review. The textual form (`review-likes:<uuid>`)
//! is a stable contract between the hub and its clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ArtworkId, ReviewId};

const ARTWORK_RATING: &str = "artwork-rating";
const REVIEW_LIKES: &str = "review-likes";
const REVIEW_COMMENTS: &str = "review-comments";

/// A named broadcast channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Topic {
    ArtworkRating(ArtworkId),
    ReviewLikes(ReviewId),
    ReviewComments(ReviewId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicParseError {
    #[error("Missing ':' separator in topic '{0}'")]
    MissingSeparator(String),

    #[error("Unknown topic kind '{0}'")]
    UnknownKind(String),

    #[error("Invalid topic key '{0}'")]
    InvalidKey(String),
}

impl Topic {
    pub fn kind(&self) -> &'static str {
        match self {
            Topic::ArtworkRating(_) => ARTWORK_RATING,
            Topic::ReviewLikes(_) => REVIEW_LIKES,
            Topic::ReviewComments(_) => REVIEW_COMMENTS,
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::ArtworkRating(id) => write!(f, "{}:{}", ARTWORK_RATING, id),
            Topic::ReviewLikes(id) => write!(f, "{}:{}", REVIEW_LIKES, id),
            Topic::ReviewComments(id) => write!(f, "{}:{}", REVIEW_COMMENTS, id),
        }
    }
}

impl std::str::FromStr for Topic {
    type Err = TopicParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, key) = s
            .split_once(':')
            .ok_or_else(|| TopicParseError::MissingSeparator(s.to_string()))?;

        let invalid_key = |_: uuid::Error| TopicParseError::InvalidKey(key.to_string());
        match kind {
            ARTWORK_RATING => Ok(Topic::ArtworkRating(key.parse().map_err(invalid_key)?)),
            REVIEW_LIKES => Ok(Topic::ReviewLikes(key.parse().map_err(invalid_key)?)),
            REVIEW_COMMENTS => Ok(Topic::ReviewComments(key.parse().map_err(invalid_key)?)),
            _ => Err(TopicParseError::UnknownKind(kind.to_string())),
        }
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.to_string()
    }
}

impl TryFrom<String> for Topic {
    type Error = TopicParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
