//! Application layer
//!
//! Services coordinating the hub's bookkeeping. Services are generic over
//! port traits so tests can drive them with in-memory adapters.

pub mod broadcast_hub;
pub mod connection_registry;
pub mod tag_usage_service;

pub use broadcast_hub::{EventBroadcastHub, HubConfig};
pub use connection_registry::ConnectionRegistry;
pub use tag_usage_service::TagUsageService;
