//! Indexer client for fetching account events

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::event::FeedEvent;

/// Source of recent account events
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Most recent events of `address`, newest first as the indexer returns them
    async fn recent_events(&self, address: &str, limit: usize) -> Result<Vec<FeedEvent>>;
}

/// TonAPI v2 client
#[derive(Debug, Clone)]
pub struct TonApiClient {
    config: FeedConfig,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<Value>,
}

impl TonApiClient {
    /// Build a client from configuration
    pub fn new(config: FeedConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FeedError::Config(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Configured base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn map_transport(&self, err: reqwest::Error) -> FeedError {
        if err.is_timeout() {
            FeedError::Timeout(self.config.timeout_ms)
        } else {
            FeedError::Http(err)
        }
    }
}

#[async_trait]
impl EventFeed for TonApiClient {
    async fn recent_events(&self, address: &str, limit: usize) -> Result<Vec<FeedEvent>> {
        let url = format!(
            "{}/accounts/{}/events?limit={}",
            self.config.base_url.trim_end_matches('/'),
            address,
            limit
        );
        debug!(%url, "Fetching account events");

        let mut request = self.http_client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Indexer returned error");
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.map_transport(e))?;
        let parsed: EventsResponse =
            serde_json::from_str(&body).map_err(|e| FeedError::Decode(e.to_string()))?;

        debug!(count = parsed.events.len(), "Fetched account events");

        Ok(parsed.events.into_iter().map(FeedEvent::new).collect())
    }
}
