//! In-process adapters
//!
//! Tag rows are kept in memory; the hub process is their only writer.

mod tag_repo;

pub use tag_repo::InMemoryTagRepository;
