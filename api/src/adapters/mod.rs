//! Adapters layer
//!
//! Implementations of port traits for external systems.

pub mod memory;
pub mod sse;

pub use memory::InMemoryTagRepository;
pub use sse::ChannelSink;
