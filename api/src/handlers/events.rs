//! Event handlers
//!
//! The SSE stream viewers listen on, and the write-path notification
//! endpoint that publishes into the hub.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

use crate::adapters::ChannelSink;
use crate::app::EventBroadcastHub;
use crate::domain::entities::{ConnectionId, DomainEvent, PublishReport};
use crate::AppState;

/// Envelopes buffered between the delivery task and the HTTP body
const STREAM_BUFFER: usize = 16;

/// Closes the hub connection when the SSE body is dropped
struct ConnectionGuard {
    hub: Arc<EventBroadcastHub>,
    connection_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.close_connection(self.connection_id);
    }
}

/// GET /events/stream
///
/// Opens a hub connection. The first event, `connected`, carries the
/// connection id to subscribe with; every later event is named after the
/// domain event it carries.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (sink, receiver) = ChannelSink::channel(STREAM_BUFFER);
    let connection_id = state.hub.open_connection(Arc::new(sink));
    let guard = ConnectionGuard {
        hub: state.hub.clone(),
        connection_id,
    };

    let connected = SseEvent::default()
        .event("connected")
        .data(connection_id.to_string());

    let events = ReceiverStream::new(receiver).filter_map(move |envelope| {
        let _guard = &guard;
        match SseEvent::default()
            .event(envelope.event.name())
            .json_data(&envelope)
        {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::error!(
                    connection_id = %connection_id,
                    "Failed to serialize SSE payload for {}: {}",
                    envelope.event.name(),
                    err
                );
                None
            }
        }
    });

    let stream = tokio_stream::once(connected)
        .chain(events)
        .map(Ok::<_, Infallible>);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.config.sse_keep_alive)
            .text("keep-alive"),
    )
}

/// POST /events
///
/// Called by the write path after a change commits.
pub async fn post_event(
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> (StatusCode, Json<PublishReport>) {
    let report = state.hub.publish(event);
    (StatusCode::ACCEPTED, Json(report))
}
