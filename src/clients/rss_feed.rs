//! Public channel feed over HTTP

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::core::config::FeedConfig;
use crate::core::feed_collector::{feed_url, FeedSource};
use crate::core::models::AppResult;
use crate::utils::network::{build_client, ensure_success};

pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    /// The client timeout backs up the collector's own per-channel timeout
    pub fn new(config: &FeedConfig) -> AppResult<Self> {
        let client = build_client(
            &config.user_agent,
            Duration::from_secs(config.timeout_seconds),
        )?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_feed(&self, channel_id: &str) -> AppResult<Vec<u8>> {
        let response = ensure_success(self.client.get(feed_url(channel_id)).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
