//! ArtSync Hub Server
//!
//! Pushes review, rating, like and comment changes to connected viewers and
//! keeps review tag usage consistent under concurrent edits.
//! Uses hexagonal (ports & adapters) architecture for clean separation of concerns.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adapters;
mod app;
mod config;
mod domain;
mod error;
mod handlers;

#[cfg(test)]
mod test_utils;


use adapters::InMemoryTagRepository;
use app::{EventBroadcastHub, HubConfig, TagUsageService};
use config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<EventBroadcastHub>,
    pub tag_service: Arc<TagUsageService<InMemoryTagRepository>>,
    pub tag_repo: Arc<InMemoryTagRepository>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, tag_repo: Arc<InMemoryTagRepository>) -> Self {
        Self {
            hub: Arc::new(EventBroadcastHub::new(HubConfig::from(&config))),
            tag_service: Arc::new(TagUsageService::new(tag_repo.clone())),
            tag_repo,
            config,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    connections: usize,
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.hub.registry().connection_count(),
    })
}

/// Build the router for the given state
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Event stream and write-path notifications
        .route("/events/stream", get(handlers::stream_events))
        .route("/events", post(handlers::post_event))
        // Connection topics
        .route(
            "/connections/:id/subscriptions",
            post(handlers::subscribe).get(handlers::list_connection_topics),
        )
        .route(
            "/connections/:id/subscriptions/:topic",
            delete(handlers::unsubscribe),
        )
        .route("/connections/:id", delete(handlers::close_connection))
        .route(
            "/topics/:topic/subscribers",
            get(handlers::list_topic_subscribers),
        )
        // Tags
        .route("/tags", get(handlers::list_tags).post(handlers::create_tag))
        .route("/tags/:id/usage", get(handlers::get_tag_usage))
        .route(
            "/reviews/:id/tags",
            get(handlers::get_review_tags)
                .put(handlers::edit_review_tags)
                .delete(handlers::clear_review_tags),
        )
        .route("/reviews/:id/tags/diff", post(handlers::diff_review_tags))
        .route(
            "/reviews/:id/tags/:tag_id",
            put(handlers::add_review_tag).delete(handlers::remove_review_tag),
        )
        // Middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,artsync_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ArtSync hub...");

    let config = Config::from_env();
    tracing::info!(
        queue_capacity = config.hub_queue_capacity,
        delivery_timeout_ms = config.hub_delivery_timeout.as_millis() as u64,
        "Hub configured"
    );

    let state = AppState::new(config.clone(), Arc::new(InMemoryTagRepository::new()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(state))
        .await
        .context("Server error")?;

    Ok(())
}
