//! Review read models
//!
//! These mirror the JSON the data API returns for feed pages and single
//! review lookups. Field names follow the API's camelCase wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ArtworkId, CommentId, GroupId, ReviewId, TagId, UserId};

/// A review of an artwork, with its nested associations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub user: UserSummary,
    pub artwork: ArtworkSummary,
    pub group: GroupSummary,
    pub title: String,
    pub text: String,
    pub mark: i32,
    /// Number of likes across all users
    #[serde(default)]
    pub likes: i64,
    /// Whether the viewer the review was fetched for liked it
    #[serde(rename = "isLikedByUser", default)]
    pub liked_by_viewer: bool,
    #[serde(rename = "reviewImages", default)]
    pub images: Vec<ReviewImage>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub user_name: String,
}

/// The reviewed artwork with its average rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkSummary {
    pub id: ArtworkId,
    pub name: String,
    #[serde(default)]
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: GroupId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewImage {
    pub image_url: String,
}

/// A tag label. Labels are unique and compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub text: String,
}

/// A comment on a review. Deletion is hard; there is no tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub review_id: ReviewId,
    pub user_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
