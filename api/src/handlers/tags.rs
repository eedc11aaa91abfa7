//! Tag handlers
//!
//! Tag usage reads and review tag edits.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::entities::{ReviewId, Tag, TagDiff, TagEdit, TagId, TagUsage};
use crate::domain::ports::TagRepository;
use crate::error::{AppError, DomainError};
use crate::AppState;

/// Request body for POST /tags
#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub text: String,
}

/// Proposed tag set for a review
#[derive(Debug, Deserialize)]
pub struct TagLabelsRequest {
    pub labels: Vec<String>,
}

/// GET /tags
///
/// Every tag with its usage count.
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagUsage>>, AppError> {
    Ok(Json(state.tag_service.list_usage().await?))
}

/// POST /tags
pub async fn create_tag(
    State(state): State<AppState>,
    Json(body): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    if body.text.is_empty() {
        return Err(AppError::BadRequest("Tag text must not be empty".to_string()));
    }
    let tag = state.tag_repo.create(&body.text).await?;
    tracing::info!(tag_id = %tag.id, text = %tag.text, "Tag created");
    Ok((StatusCode::CREATED, Json(tag)))
}

/// GET /tags/:id/usage
pub async fn get_tag_usage(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<TagUsage>, AppError> {
    let tag = state
        .tag_repo
        .find_by_id(TagId(id))
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("Tag {}", id)))?;

    Ok(Json(TagUsage {
        usage_count: state.tag_service.count_usage(tag.id),
        tag,
    }))
}

/// GET /reviews/:id/tags
pub async fn get_review_tags(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(state.tag_service.review_tags(ReviewId(id)).await?))
}

/// PUT /reviews/:id/tags
///
/// Replace the review's tags with the proposed labels, creating new tags.
pub async fn edit_review_tags(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TagLabelsRequest>,
) -> Result<Json<TagEdit>, AppError> {
    let edit = state
        .tag_service
        .edit_review_tags(ReviewId(id), &body.labels)
        .await?;
    Ok(Json(edit))
}

/// POST /reviews/:id/tags/diff
///
/// Preview what an edit would add and remove without applying it.
pub async fn diff_review_tags(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TagLabelsRequest>,
) -> Result<Json<TagDiff>, AppError> {
    let diff = state
        .tag_service
        .diff_tags(ReviewId(id), &body.labels)
        .await?;
    Ok(Json(diff))
}

/// PUT /reviews/:id/tags/:tag_id
pub async fn add_review_tag(
    State(state): State<AppState>,
    Path((id, tag_id)): Path<(Uuid, i32)>,
) -> Result<StatusCode, AppError> {
    state
        .tag_service
        .add_tag(ReviewId(id), TagId(tag_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /reviews/:id/tags/:tag_id
pub async fn remove_review_tag(
    State(state): State<AppState>,
    Path((id, tag_id)): Path<(Uuid, i32)>,
) -> Result<StatusCode, AppError> {
    state
        .tag_service
        .remove_tag(ReviewId(id), TagId(tag_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /reviews/:id/tags
///
/// Called when a review is deleted. The review cannot be tagged again.
pub async fn clear_review_tags(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<serde_json::Value> {
    let removed = state.tag_service.remove_all_tags(ReviewId(id)).await;
    Json(serde_json::json!({ "removed": removed }))
}
