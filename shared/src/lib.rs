//! Shared domain types for ArtSync
//!
//! Entities exchanged between the hub server and viewer clients:
//! - `ids`: Strongly typed identifiers
//! - `review`: Review, comment and tag models as returned by the data API
//! - `topic`: Broadcast topic keys
//! - `event`: Domain events and the envelope delivered to connections

pub mod event;
pub mod ids;
pub mod review;
pub mod topic;

pub use event::{DomainEvent, EventEnvelope};
pub use ids::{ArtworkId, CommentId, ConnectionId, GroupId, ReviewId, TagId, UserId};
pub use review::{ArtworkSummary, Comment, GroupSummary, Review, ReviewImage, Tag, UserSummary};
pub use topic::{Topic, TopicParseError};
