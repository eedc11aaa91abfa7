//! HTTP handlers
//!
//! Axum request handlers for the API endpoints.

pub mod events;
pub mod subscriptions;
pub mod tags;

pub use events::{post_event, stream_events};
pub use subscriptions::{
    close_connection, list_connection_topics, list_topic_subscribers, subscribe, unsubscribe,
};
pub use tags::{
    add_review_tag, clear_review_tags, create_tag, diff_review_tags, edit_review_tags,
    get_review_tags, get_tag_usage, list_tags, remove_review_tag,
};
