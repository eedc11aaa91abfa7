//! ArtSync feed watcher
//!
//! Opens a hub connection, loads the highest-marked feed and keeps it in
//! step with pushed events, printing the feed whenever it changes.
//! Configured through `ARTSYNC_*` environment variables.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use artsync_client::{
    pump_events, ClientConfig, DataApiClient, FeedReconciler, FeedSession, HubClient,
    SubscriptionRouter,
};
use artsync_shared::Review;

const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

fn render(reviews: &[Review]) -> String {
    reviews
        .iter()
        .enumerate()
        .map(|(i, review)| {
            format!(
                "{:>2}. [{}] {} on {} (rate {:.1}) by {}, {} likes{}",
                i + 1,
                review.mark,
                review.title,
                review.artwork.name,
                review.artwork.rate,
                review.user.user_name,
                review.likes,
                if review.liked_by_viewer { ", liked" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, the feed to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,artsync_client=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(api = %config.api_url, hub = %config.hub_url, "Starting ArtSync watcher");

    let data_api = Arc::new(DataApiClient::new(&config.api_url)?);
    let hub = HubClient::new(&config.hub_url)?;

    let (connection_id, stream) = hub
        .open_stream()
        .await
        .context("Failed to open hub event stream")?;
    let router = Arc::new(SubscriptionRouter::new(Arc::new(hub.control(connection_id))));

    let shutdown = CancellationToken::new();
    let pump = tokio::spawn(pump_events(stream, router.clone(), shutdown.child_token()));

    let reconciler = Arc::new(FeedReconciler::from_config(data_api, &config));
    let session = FeedSession::start(reconciler, router, &shutdown);
    session
        .load_next_page()
        .await
        .context("Failed to load the first feed page")?;

    let mut last = String::new();
    let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let rendered = render(&session.snapshot());
                if rendered != last {
                    println!("{}\n", rendered);
                    last = rendered;
                }
            }
        }
    }

    tracing::info!("Shutting down");
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to release topics");
    }
    shutdown.cancel();
    if let Err(e) = pump.await {
        tracing::warn!(error = %e, "Event pump failed");
    }
    if let Err(e) = hub.close(connection_id).await {
        tracing::warn!(error = %e, "Failed to close hub connection");
    }

    Ok(())
}
