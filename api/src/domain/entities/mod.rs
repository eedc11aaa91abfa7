//! Domain entities
//!
//! Review, tag and event models are shared with viewer clients through
//! `artsync-shared`; the hub-only bookkeeping types live here.

pub mod subscription;
pub mod tag_usage;

pub use artsync_shared::{
    ArtworkId, Comment, CommentId, ConnectionId, DomainEvent, EventEnvelope, ReviewId, Tag,
    TagId, Topic, UserId,
};
pub use subscription::{PublishReport, SubscriptionHandle};
pub use tag_usage::{TagDiff, TagEdit, TagUsage};
