//! HTTP clients for the data API and the event hub

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use artsync_shared::{ConnectionId, Review, ReviewId, Topic, UserId};

use crate::error::ClientError;
use crate::source::{FeedFilter, ReviewSource, TopicControl};
use crate::stream::EventStream;

fn build_client() -> Result<reqwest::Client, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {}", e)))
}

// --- Data API ---

/// Client for the review data API
#[derive(Clone)]
pub struct DataApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl DataApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[cfg(test)]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        handle_json_response(response, path).await
    }
}

/// Query string of a feed page request; tag ids repeat the `tagids` key
fn feed_query(filter: &FeedFilter, page: u32) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(viewer) = filter.viewer_id {
        query.push(("userid", viewer.to_string()));
    }
    for tag in &filter.tag_ids {
        query.push(("tagids", tag.to_string()));
    }
    query.push(("pageNumber", page.to_string()));
    query
}

fn viewer_query(viewer_id: Option<UserId>) -> Vec<(&'static str, String)> {
    viewer_id
        .map(|viewer| vec![("viewerid", viewer.to_string())])
        .unwrap_or_default()
}

#[async_trait]
impl ReviewSource for DataApiClient {
    async fn highest_marked(
        &self,
        filter: &FeedFilter,
        page: u32,
    ) -> Result<Vec<Review>, ClientError> {
        self.get_json("/reviews/highest-marked", &feed_query(filter, page))
            .await
    }

    async fn fetch_review(
        &self,
        author_id: UserId,
        review_id: ReviewId,
        viewer_id: Option<UserId>,
    ) -> Result<Review, ClientError> {
        self.get_json(
            &format!("/review/{}/{}", author_id, review_id),
            &viewer_query(viewer_id),
        )
        .await
    }

    async fn connected_reviews(
        &self,
        author_id: UserId,
        review_id: ReviewId,
        viewer_id: Option<UserId>,
    ) -> Result<Vec<Review>, ClientError> {
        self.get_json(
            &format!("/review/{}/{}/connected-reviews", author_id, review_id),
            &viewer_query(viewer_id),
        )
        .await
    }
}

// --- Hub ---

/// Client for the event hub's stream and subscription endpoints
#[derive(Clone)]
pub struct HubClient {
    client: reqwest::Client,
    base_url: String,
}

impl HubClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Open the event stream and wait for the hub to announce the connection
    pub async fn open_stream(&self) -> Result<(ConnectionId, EventStream), ClientError> {
        let url = format!("{}/events/stream", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = ensure_success(response, "/events/stream").await?;

        let mut stream = EventStream::from_response(response);
        let connection_id = stream.handshake().await?;
        tracing::info!(connection_id = %connection_id, "Hub stream opened");
        Ok((connection_id, stream))
    }

    pub async fn subscribe(
        &self,
        connection_id: ConnectionId,
        topic: Topic,
    ) -> Result<(), ClientError> {
        let path = format!("/connections/{}/subscriptions", connection_id);
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&SubscribeRequest { topic })
            .send()
            .await?;
        ensure_success(response, &path).await.map(|_| ())
    }

    pub async fn unsubscribe(
        &self,
        connection_id: ConnectionId,
        topic: Topic,
    ) -> Result<(), ClientError> {
        let path = format!("/connections/{}/subscriptions/{}", connection_id, topic);
        let response = self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        ensure_success(response, &path).await.map(|_| ())
    }

    pub async fn close(&self, connection_id: ConnectionId) -> Result<(), ClientError> {
        let path = format!("/connections/{}", connection_id);
        let response = self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        ensure_success(response, &path).await.map(|_| ())
    }

    /// Topic control bound to one open connection
    pub fn control(&self, connection_id: ConnectionId) -> HubControl {
        HubControl {
            hub: self.clone(),
            connection_id,
        }
    }
}

/// `TopicControl` for a single hub connection
#[derive(Clone)]
pub struct HubControl {
    hub: HubClient,
    connection_id: ConnectionId,
}

impl HubControl {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

#[async_trait]
impl TopicControl for HubControl {
    async fn subscribe(&self, topic: Topic) -> Result<(), ClientError> {
        self.hub.subscribe(self.connection_id, topic).await
    }

    async fn unsubscribe(&self, topic: Topic) -> Result<(), ClientError> {
        self.hub.unsubscribe(self.connection_id, topic).await
    }
}

async fn ensure_success(
    response: reqwest::Response,
    path: &str,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(path.to_string()));
    }

    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn handle_json_response<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, ClientError> {
    let response = ensure_success(response, path).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

// --- Request Types ---

#[derive(Debug, Serialize)]
struct SubscribeRequest {
    topic: Topic,
}
