//! Test utilities
//!
//! Manual mock implementations and test fixtures for unit testing.
//!
//! Sinks and repositories are hand-written rather than generated with
//! mockall: tests need to hold deliveries open, fail them on demand and
//! inspect what arrived, which is easier to express directly.

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
