//! In-memory adapter for TagRepository

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::entities::{Tag, TagId};
use crate::domain::ports::TagRepository;
use crate::error::DomainError;

#[derive(Default)]
struct TagTable {
    by_id: BTreeMap<TagId, Tag>,
    by_label: HashMap<String, TagId>,
    next_id: i32,
}

/// In-memory implementation of TagRepository
#[derive(Default)]
pub struct InMemoryTagRepository {
    table: RwLock<TagTable>,
}

impl InMemoryTagRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing labels, assigning ids in order
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = TagTable::default();
        for label in labels {
            let label = label.into();
            if table.by_label.contains_key(&label) {
                continue;
            }
            table.next_id += 1;
            let tag = Tag {
                id: TagId(table.next_id),
                text: label.clone(),
            };
            table.by_label.insert(label, tag.id);
            table.by_id.insert(tag.id, tag);
        }
        Self {
            table: RwLock::new(table),
        }
    }
}

fn poisoned<T>(_: T) -> DomainError {
    DomainError::Internal("tag table lock poisoned".to_string())
}

#[async_trait]
impl TagRepository for InMemoryTagRepository {
    async fn find_by_id(&self, id: TagId) -> Result<Option<Tag>, DomainError> {
        let table = self.table.read().map_err(poisoned)?;
        Ok(table.by_id.get(&id).cloned())
    }

    async fn find_by_label(&self, label: &str) -> Result<Option<Tag>, DomainError> {
        let table = self.table.read().map_err(poisoned)?;
        Ok(table
            .by_label
            .get(label)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[TagId]) -> Result<Vec<Tag>, DomainError> {
        let table = self.table.read().map_err(poisoned)?;
        Ok(ids
            .iter()
            .filter_map(|id| table.by_id.get(id))
            .cloned()
            .collect())
    }

    async fn create(&self, label: &str) -> Result<Tag, DomainError> {
        let mut table = self.table.write().map_err(poisoned)?;
        if table.by_label.contains_key(label) {
            return Err(DomainError::AlreadyExists(format!("Tag '{}'", label)));
        }

        table.next_id += 1;
        let tag = Tag {
            id: TagId(table.next_id),
            text: label.to_string(),
        };
        table.by_label.insert(tag.text.clone(), tag.id);
        table.by_id.insert(tag.id, tag.clone());

        tracing::debug!(tag_id = %tag.id, label = %tag.text, "Tag created");
        Ok(tag)
    }

    async fn list(&self) -> Result<Vec<Tag>, DomainError> {
        let table = self.table.read().map_err(poisoned)?;
        Ok(table.by_id.values().cloned().collect())
    }
}
