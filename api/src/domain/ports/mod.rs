//! Domain ports (traits)
//!
//! Port traits define interfaces that the domain layer requires.
//! Adapters provide concrete implementations of these traits.

pub mod event_sink;
pub mod repositories;

pub use event_sink::EventSink;
pub use repositories::TagRepository;
