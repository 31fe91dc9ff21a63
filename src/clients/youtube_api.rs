//! reqwest-backed client for the YouTube Data API
//!
//! Statistics lookups authenticate with the API key when one is configured and
//! fall back to the user's bearer token. Subscription calls always need the
//! token.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::config::ApiConfig;
use crate::core::models::{AppError, AppResult, Subscription};
use crate::core::session::SubscriptionSource;
use crate::core::stats_fetcher::{StatsApi, StatsKind, MAX_BATCH_SIZE};
use crate::utils::network::{build_client, ensure_success};

const SUBSCRIPTIONS_PAGE_SIZE: &str = "50";

pub struct YoutubeApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl YoutubeApiClient {
    pub fn new(config: &ApiConfig, user_agent: &str) -> AppResult<Self> {
        let client = build_client(user_agent, Duration::from_secs(config.timeout_seconds))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
        })
    }

    pub fn has_user_credentials(&self) -> bool {
        self.access_token.is_some()
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    fn with_user_token(&self, request: RequestBuilder) -> AppResult<RequestBuilder> {
        match self.access_token {
            Some(ref token) => Ok(request.bearer_auth(token)),
            None => Err(AppError::Precondition(
                "Sign in is required to access subscriptions".to_string(),
            )),
        }
    }

    fn with_any_credentials(&self, request: RequestBuilder) -> AppResult<RequestBuilder> {
        match self.api_key {
            Some(ref key) => Ok(request.query(&[("key", key.as_str())])),
            None => self.with_user_token(request).map_err(|_| {
                AppError::Precondition("An API key or sign in is required".to_string())
            }),
        }
    }

    async fn send_json(&self, request: RequestBuilder) -> AppResult<Value> {
        let response = ensure_success(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn list_page(&self, page_token: Option<&str>) -> AppResult<Value> {
        let mut query = vec![
            ("part", "snippet"),
            ("mine", "true"),
            ("maxResults", SUBSCRIPTIONS_PAGE_SIZE),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        let request = self
            .with_user_token(self.client.get(self.endpoint("subscriptions")))?
            .query(&query);
        self.send_json(request).await
    }
}

#[async_trait]
impl StatsApi for YoutubeApiClient {
    async fn list_items(&self, kind: StatsKind, ids: &[String]) -> AppResult<Vec<Value>> {
        if ids.len() > MAX_BATCH_SIZE {
            return Err(AppError::Precondition(format!(
                "at most {} ids per {} lookup",
                MAX_BATCH_SIZE,
                kind.as_str()
            )));
        }

        let part = match kind {
            StatsKind::Channels => "snippet,statistics",
            StatsKind::Videos => "statistics,contentDetails",
        };
        let id_list = ids.join(",");
        let request = self
            .with_any_credentials(self.client.get(self.endpoint(kind.as_str())))?
            .query(&[("part", part), ("id", id_list.as_str())]);

        let body = self.send_json(request).await?;
        let items = items_of(body);
        debug!("{} lookup for {} ids returned {} items", kind.as_str(), ids.len(), items.len());
        Ok(items)
    }
}

#[async_trait]
impl SubscriptionSource for YoutubeApiClient {
    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        let mut subscriptions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(page_token.as_deref()).await?;
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string);

            subscriptions.extend(items_of(page).iter().filter_map(subscription_from_item));

            if page_token.is_none() {
                break;
            }
        }

        info!("Listed {} subscriptions", subscriptions.len());
        Ok(subscriptions)
    }

    async fn unsubscribe(&self, channel_id: &str) -> AppResult<()> {
        let lookup = self
            .with_user_token(self.client.get(self.endpoint("subscriptions")))?
            .query(&[("part", "id"), ("forChannelId", channel_id), ("mine", "true")]);
        let found = self.send_json(lookup).await?;

        let subscription_id = found
            .pointer("/items/0/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Precondition(format!("No subscription found for channel {}", channel_id))
            })?;

        let delete = self
            .with_user_token(self.client.delete(self.endpoint("subscriptions")))?
            .query(&[("id", subscription_id.as_str())]);
        ensure_success(delete.send().await?).await?;

        info!("Deleted subscription {} ({})", subscription_id, channel_id);
        Ok(())
    }
}

fn items_of(mut body: Value) -> Vec<Value> {
    match body.get_mut("items").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn subscription_from_item(item: &Value) -> Option<Subscription> {
    let snippet = item.get("snippet")?;
    let channel_id = snippet.pointer("/resourceId/channelId")?.as_str()?;
    let text = |pointer: &str| {
        snippet
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_default()
    };

    Some(Subscription::new(
        channel_id,
        text("/title"),
        text("/thumbnails/default/url"),
        text("/description"),
    ))
}
