use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::feed::parse::parse_live_feed;
use crate::feed::FeedClient;
use crate::types::GameSnapshot;

/// Pulls the live game feed over HTTP.
pub struct HttpFeedClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFeedClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn live_feed_url(&self, game_id: &str) -> String {
        format!("{}/api/v1.1/game/{}/feed/live", self.base_url, game_id)
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_snapshot(&self, game_id: &str) -> Result<Option<GameSnapshot>> {
        let url = self.live_feed_url(game_id);
        let resp = self.client.get(&url).send().await.map_err(|e| {
            AppError::TransientUpstream(format!("GET {url}: {e}"))
        })?;

        match resp.status() {
            StatusCode::NOT_FOUND => {
                debug!(game_id, "Feed has no game {game_id}");
                return Ok(None);
            }
            status if status.is_server_error() => {
                return Err(AppError::TransientUpstream(format!("GET {url}: HTTP {status}")));
            }
            status if !status.is_success() => {
                return Err(AppError::FeedParse(format!("GET {url}: HTTP {status}")));
            }
            _ => {}
        }

        let body: serde_json::Value = resp.json().await?;
        parse_live_feed(game_id, &body).map(Some)
    }
}
