use std::env;
use std::time::Duration;

use artsync_shared::{TagId, UserId};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the data API serving reviews
    pub api_url: String,
    /// Base URL of the event hub
    pub hub_url: String,
    /// Viewer the feed is personalised for
    pub viewer_id: Option<UserId>,
    /// Tag filter applied to the feed
    pub tag_ids: Vec<TagId>,
    /// Reviews per feed page; a shorter page ends the feed
    pub page_size: usize,
    /// Bound on a single page load or review fetch
    pub load_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            api_url: env::var("ARTSYNC_API_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            hub_url: env::var("ARTSYNC_HUB_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            viewer_id: parse_var("ARTSYNC_VIEWER_ID"),
            tag_ids: env::var("ARTSYNC_TAG_IDS")
                .map(|raw| parse_tag_ids(&raw))
                .unwrap_or_default(),
            page_size: parse_var("ARTSYNC_PAGE_SIZE")
                .filter(|size| *size > 0)
                .unwrap_or(4),
            load_timeout: Duration::from_millis(
                parse_var("ARTSYNC_LOAD_TIMEOUT_MS").unwrap_or(10_000),
            ),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000".to_string(),
            hub_url: "http://localhost:8080".to_string(),
            viewer_id: None,
            tag_ids: Vec::new(),
            page_size: 4,
            load_timeout: Duration::from_secs(10),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Comma separated tag ids; unparsable entries are skipped
fn parse_tag_ids(raw: &str) -> Vec<TagId> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i32>().ok())
        .map(TagId)
        .collect()
}
