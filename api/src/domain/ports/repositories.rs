//! Repository port traits
//!
//! Tag rows are owned upstream; the hub only needs to look them up and to
//! create rows for labels a review edit introduces.

use async_trait::async_trait;

use crate::domain::entities::{Tag, TagId};
use crate::error::DomainError;

/// Repository for tag rows
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Find a tag by id
    async fn find_by_id(&self, id: TagId) -> Result<Option<Tag>, DomainError>;

    /// Find a tag by its exact label
    async fn find_by_label(&self, label: &str) -> Result<Option<Tag>, DomainError>;

    /// Find every tag in `ids`; unknown ids are left out
    async fn find_by_ids(&self, ids: &[TagId]) -> Result<Vec<Tag>, DomainError>;

    /// Create a tag row. Fails with `AlreadyExists` if the label is taken.
    async fn create(&self, label: &str) -> Result<Tag, DomainError>;

    /// List all tags ordered by id
    async fn list(&self) -> Result<Vec<Tag>, DomainError>;
}
