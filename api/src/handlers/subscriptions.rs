//! Subscription handlers
//!
//! Viewers open a stream first, then manage the topics of that connection
//! through these endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::entities::{ConnectionId, SubscriptionHandle, Topic};
use crate::error::{AppError, DomainError};
use crate::AppState;

/// Request body for POST /connections/:id/subscriptions
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub topic: Topic,
}

fn parse_topic(raw: &str) -> Result<Topic, AppError> {
    raw.parse()
        .map_err(|e: artsync_shared::TopicParseError| AppError::BadRequest(e.to_string()))
}

/// POST /connections/:id/subscriptions
pub async fn subscribe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscriptionHandle>), AppError> {
    let handle = state.hub.subscribe(ConnectionId(id), body.topic)?;
    Ok((StatusCode::CREATED, Json(handle)))
}

/// DELETE /connections/:id/subscriptions/:topic
///
/// Unknown subscriptions are ignored.
pub async fn unsubscribe(
    State(state): State<AppState>,
    Path((id, topic)): Path<(Uuid, String)>,
) -> Result<StatusCode, AppError> {
    let handle = SubscriptionHandle {
        connection_id: ConnectionId(id),
        topic: parse_topic(&topic)?,
    };
    state.hub.unsubscribe(&handle);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /connections/:id/subscriptions
pub async fn list_connection_topics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Topic>>, AppError> {
    let connection_id = ConnectionId(id);
    if state.hub.registry().connection(connection_id).is_none() {
        return Err(DomainError::NotFound(format!("Connection {}", connection_id)).into());
    }
    Ok(Json(state.hub.registry().topics_for(connection_id)))
}

/// DELETE /connections/:id
pub async fn close_connection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    state.hub.close_connection(ConnectionId(id));
    StatusCode::NO_CONTENT
}

/// GET /topics/:topic/subscribers
pub async fn list_topic_subscribers(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Json<Vec<ConnectionId>>, AppError> {
    let topic = parse_topic(&topic)?;
    Ok(Json(state.hub.registry().list_subscribers(&topic)))
}
