//! ArtSync viewer client
//!
//! Keeps a viewer's copy of the review feed in step with the hub:
//! - `feed`: paged, deduplicated feed replica that refetches on events
//! - `review_view`: the same rules applied to a single review page
//! - `subscriptions`: per-topic handler routing over one hub connection
//! - `session`: ties a feed to the router for the lifetime of a viewer
//! - `api_client` / `stream`: HTTP and SSE transport adapters

pub mod api_client;
pub mod config;
pub mod error;
pub mod feed;
pub mod review_view;
pub mod session;
pub mod source;
pub mod stream;
pub mod subscriptions;

#[cfg(test)]
mod test_support;

pub use api_client::{DataApiClient, HubClient, HubControl};
pub use config::ClientConfig;
pub use error::ClientError;
pub use feed::{EventOutcome, FeedReconciler, FeedStatus, LoadOutcome, ScrollPosition, SkipReason};
pub use review_view::{ReviewWatcher, WatchOutcome};
pub use session::FeedSession;
pub use source::{FeedFilter, ReviewSource, TopicControl};
pub use stream::{pump_events, EventStream, SseDecoder, SseFrame};
pub use subscriptions::{Handler, Subscription, SubscriptionRouter};
