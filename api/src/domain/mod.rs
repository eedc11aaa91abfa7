//! Domain layer
//!
//! Contains pure business logic with no external dependencies.
//! - `entities`: Domain models (shared review/event types plus hub bookkeeping)
//! - `ports`: Trait definitions for external dependencies

pub mod entities;
pub mod ports;
