//! Tag usage service
//!
//! Owns the review ↔ tag association and the per-tag usage index.
//! Writes to one review are serialized by that review's lock, so a
//! diff/create/associate/diff/remove edit is atomic to other editors and to
//! readers of the review's tag set. Different reviews never contend.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::domain::entities::{ReviewId, Tag, TagDiff, TagEdit, TagId, TagUsage};
use crate::domain::ports::TagRepository;
use crate::error::DomainError;

/// Association state of one review
#[derive(Default)]
struct ReviewSlot {
    /// Set once the review is deleted; never cleared
    retired: AtomicBool,
    tags: tokio::sync::Mutex<BTreeSet<TagId>>,
}

impl ReviewSlot {
    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

/// Service for review tag associations and usage counts
pub struct TagUsageService<TR>
where
    TR: TagRepository,
{
    tags: Arc<TR>,
    reviews: Mutex<HashMap<ReviewId, Arc<ReviewSlot>>>,
    usage: RwLock<HashMap<TagId, HashSet<ReviewId>>>,
}

impl<TR> TagUsageService<TR>
where
    TR: TagRepository,
{
    pub fn new(tags: Arc<TR>) -> Self {
        Self {
            tags,
            reviews: Mutex::new(HashMap::new()),
            usage: RwLock::new(HashMap::new()),
        }
    }

    /// Associate a tag with a review. Adding an existing pair is a no-op.
    pub async fn add_tag(&self, review_id: ReviewId, tag_id: TagId) -> Result<(), DomainError> {
        if self.tags.find_by_id(tag_id).await?.is_none() {
            return Err(DomainError::NotFound(format!("Tag {}", tag_id)));
        }

        let slot = self.live_slot(review_id)?;
        let mut tags = slot.tags.lock().await;
        ensure_not_retired(&slot, review_id)?;

        if tags.insert(tag_id) {
            self.index_add(tag_id, review_id);
            tracing::debug!(review_id = %review_id, tag_id = %tag_id, "Tag added to review");
        }
        Ok(())
    }

    /// Remove a tag from a review. Removing an absent pair is a no-op.
    pub async fn remove_tag(&self, review_id: ReviewId, tag_id: TagId) -> Result<(), DomainError> {
        let Some(slot) = self.existing_slot(review_id) else {
            return Ok(());
        };
        let mut tags = slot.tags.lock().await;

        if tags.remove(&tag_id) {
            self.index_remove(tag_id, review_id);
            tracing::debug!(review_id = %review_id, tag_id = %tag_id, "Tag removed from review");
        }
        Ok(())
    }

    /// Remove every association of a deleted review.
    ///
    /// The review is retired: later `add_tag`/edits fail with `NotFound`, and
    /// an edit already waiting for the review fails with `Conflict`. Reviews
    /// the service has never seen have nothing to clear and are not recorded.
    pub async fn remove_all_tags(&self, review_id: ReviewId) -> usize {
        let Some(slot) = self.existing_slot(review_id) else {
            return 0;
        };
        let mut tags = slot.tags.lock().await;
        let removed = self.retire_locked(review_id, &slot, &mut tags);

        tracing::info!(review_id = %review_id, removed = removed, "Review tags cleared");
        removed
    }

    fn retire_locked(&self, review_id: ReviewId, slot: &ReviewSlot, tags: &mut BTreeSet<TagId>) -> usize {
        slot.retired.store(true, Ordering::Release);
        let removed = tags.len();
        for tag_id in std::mem::take(tags) {
            self.index_remove(tag_id, review_id);
        }
        removed
    }

    /// Number of distinct reviews currently tagged with `tag_id`
    pub fn count_usage(&self, tag_id: TagId) -> u64 {
        self.usage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tag_id)
            .map_or(0, |reviews| reviews.len() as u64)
    }

    /// Proposed labels the review does not carry yet.
    ///
    /// Exact, case-sensitive comparison; input order kept, duplicates reported once.
    pub async fn diff_new_tags(
        &self,
        review_id: ReviewId,
        proposed: &[String],
    ) -> Result<Vec<String>, DomainError> {
        let current = self.review_tags(review_id).await?;
        let current: HashSet<&str> = current.iter().map(|t| t.text.as_str()).collect();
        Ok(new_labels(&current, proposed))
    }

    /// Labels the review carries that are absent from the proposal, by tag id
    pub async fn diff_removed_tags(
        &self,
        review_id: ReviewId,
        proposed: &[String],
    ) -> Result<Vec<String>, DomainError> {
        let current = self.review_tags(review_id).await?;
        Ok(removed_tags(current, proposed)
            .into_iter()
            .map(|t| t.text)
            .collect())
    }

    /// Both diffs, taken from a single read of the review's tags
    pub async fn diff_tags(
        &self,
        review_id: ReviewId,
        proposed: &[String],
    ) -> Result<TagDiff, DomainError> {
        let current = self.review_tags(review_id).await?;
        let new = {
            let labels: HashSet<&str> = current.iter().map(|t| t.text.as_str()).collect();
            new_labels(&labels, proposed)
        };
        let removed = removed_tags(current, proposed)
            .into_iter()
            .map(|t| t.text)
            .collect();
        Ok(TagDiff { new, removed })
    }

    /// Make the review's tag set equal to `proposed`, creating missing tags.
    ///
    /// Runs entirely under the review's lock. Tag rows are resolved before
    /// any association changes, so a failure leaves the set untouched.
    pub async fn edit_review_tags(
        &self,
        review_id: ReviewId,
        proposed: &[String],
    ) -> Result<TagEdit, DomainError> {
        if proposed.iter().any(|label| label.is_empty()) {
            return Err(DomainError::Validation(
                "Tag labels must not be empty".to_string(),
            ));
        }

        let slot = self.live_slot(review_id)?;
        let mut tags = slot.tags.lock().await;
        ensure_not_retired(&slot, review_id)?;

        let ids: Vec<TagId> = tags.iter().copied().collect();
        let current = self.tags.find_by_ids(&ids).await?;
        let current_labels: HashSet<&str> = current.iter().map(|t| t.text.as_str()).collect();

        let mut added = Vec::new();
        for label in new_labels(&current_labels, proposed) {
            added.push(self.get_or_create(&label).await?);
        }
        let removed = removed_tags(current, proposed);

        for tag in &added {
            if tags.insert(tag.id) {
                self.index_add(tag.id, review_id);
            }
        }
        for tag in &removed {
            if tags.remove(&tag.id) {
                self.index_remove(tag.id, review_id);
            }
        }

        tracing::info!(
            review_id = %review_id,
            added = added.len(),
            removed = removed.len(),
            "Review tags edited"
        );
        Ok(TagEdit { added, removed })
    }

    /// Current tags of a review, ordered by id
    pub async fn review_tags(&self, review_id: ReviewId) -> Result<Vec<Tag>, DomainError> {
        let Some(slot) = self.existing_slot(review_id) else {
            return Ok(Vec::new());
        };
        let ids: Vec<TagId> = {
            let tags = slot.tags.lock().await;
            if slot.is_retired() {
                return Err(DomainError::NotFound(format!("Review {}", review_id)));
            }
            tags.iter().copied().collect()
        };
        self.tags.find_by_ids(&ids).await
    }

    /// Every known tag with its usage count, including unused tags
    pub async fn list_usage(&self) -> Result<Vec<TagUsage>, DomainError> {
        let tags = self.tags.list().await?;
        Ok(tags
            .into_iter()
            .map(|tag| TagUsage {
                usage_count: self.count_usage(tag.id),
                tag,
            })
            .collect())
    }

    async fn get_or_create(&self, label: &str) -> Result<Tag, DomainError> {
        if let Some(tag) = self.tags.find_by_label(label).await? {
            return Ok(tag);
        }
        match self.tags.create(label).await {
            Ok(tag) => Ok(tag),
            // Another edit created it first
            Err(DomainError::AlreadyExists(_)) => self
                .tags
                .find_by_label(label)
                .await?
                .ok_or_else(|| DomainError::Internal(format!("Tag '{}' vanished", label))),
            Err(e) => Err(e),
        }
    }

    fn slot(&self, review_id: ReviewId) -> Arc<ReviewSlot> {
        self.reviews
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(review_id)
            .or_default()
            .clone()
    }

    fn live_slot(&self, review_id: ReviewId) -> Result<Arc<ReviewSlot>, DomainError> {
        let slot = self.slot(review_id);
        if slot.is_retired() {
            return Err(DomainError::NotFound(format!("Review {}", review_id)));
        }
        Ok(slot)
    }

    fn existing_slot(&self, review_id: ReviewId) -> Option<Arc<ReviewSlot>> {
        self.reviews
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&review_id)
            .cloned()
    }

    fn index_add(&self, tag_id: TagId, review_id: ReviewId) {
        self.usage
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tag_id)
            .or_default()
            .insert(review_id);
    }

    fn index_remove(&self, tag_id: TagId, review_id: ReviewId) {
        let mut usage = self.usage.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(reviews) = usage.get_mut(&tag_id) {
            reviews.remove(&review_id);
            if reviews.is_empty() {
                usage.remove(&tag_id);
            }
        }
    }
}

/// Checked after acquiring the review lock
fn ensure_not_retired(slot: &ReviewSlot, review_id: ReviewId) -> Result<(), DomainError> {
    if slot.is_retired() {
        return Err(DomainError::Conflict(format!(
            "Review {} was deleted during the edit",
            review_id
        )));
    }
    Ok(())
}

fn new_labels(current: &HashSet<&str>, proposed: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    proposed
        .iter()
        .filter(|label| !current.contains(label.as_str()) && seen.insert(label.as_str()))
        .cloned()
        .collect()
}

fn removed_tags(current: Vec<Tag>, proposed: &[String]) -> Vec<Tag> {
    let proposed: HashSet<&str> = proposed.iter().map(String::as_str).collect();
    current
        .into_iter()
        .filter(|tag| !proposed.contains(tag.text.as_str()))
        .collect()
}
