//! Tag usage read models

use serde::Serialize;

use super::Tag;

/// A tag with the number of distinct reviews currently using it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagUsage {
    pub tag: Tag,
    pub usage_count: u64,
}

/// Labels a proposed tag set would add and remove
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagDiff {
    pub new: Vec<String>,
    pub removed: Vec<String>,
}

/// Result of reconciling a review's tag set with a proposal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagEdit {
    pub added: Vec<Tag>,
    pub removed: Vec<Tag>,
}

impl TagEdit {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
