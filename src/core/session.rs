//! Discovery session
//!
//! Owns everything one signed-in user works with: the loaded subscription
//! list, the TTL cache and the discovery pipeline. Commands borrow the
//! session instead of reaching for process-wide state.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::cache::{CacheInfo, TtlCache, SUBSCRIPTIONS_NAMESPACE};
use crate::core::models::{AppError, AppResult, FilterConfig, PipelineResult, Subscription};
use crate::core::pipeline::DiscoveryPipeline;
use crate::core::progress::ProgressSink;
use crate::core::stats_fetcher::{BatchStatsFetcher, StatsApi};

/// The signed-in user's subscriptions
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// Every subscription, following pagination to the end
    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>>;

    async fn unsubscribe(&self, channel_id: &str) -> AppResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedSubscriptions {
    pub subscriptions: Vec<Subscription>,
    pub from_cache: bool,
}

pub struct DiscoverySession {
    subscription_source: Option<Arc<dyn SubscriptionSource>>,
    stats_api: Arc<dyn StatsApi>,
    fetcher: BatchStatsFetcher,
    pipeline: DiscoveryPipeline,
    cache: TtlCache,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl DiscoverySession {
    pub fn new(
        subscription_source: Option<Arc<dyn SubscriptionSource>>,
        stats_api: Arc<dyn StatsApi>,
        fetcher: BatchStatsFetcher,
        pipeline: DiscoveryPipeline,
        cache: TtlCache,
    ) -> Self {
        Self {
            subscription_source,
            stats_api,
            fetcher,
            pipeline,
            cache,
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Serves the cached list unless `force_refresh` is set or the cache is stale
    pub async fn load_subscriptions(&self, force_refresh: bool) -> AppResult<LoadedSubscriptions> {
        if !force_refresh {
            if let Some(mut cached) = self
                .cache
                .get::<Vec<Subscription>>(SUBSCRIPTIONS_NAMESPACE)
                .filter(|subs| !subs.is_empty())
            {
                if self.backfill_subscriber_counts(&mut cached).await {
                    self.replace_cached_subscriptions(&cached);
                }

                info!("Loaded {} subscriptions from cache", cached.len());
                *self.subscriptions.write() = cached.clone();
                return Ok(LoadedSubscriptions {
                    subscriptions: cached,
                    from_cache: true,
                });
            }
        }

        let source = self.subscription_source()?;
        let mut subscriptions = source.list_subscriptions().await?;
        if subscriptions.is_empty() {
            return Err(AppError::Precondition(
                "No subscribed channels found".to_string(),
            ));
        }

        self.backfill_subscriber_counts(&mut subscriptions).await;
        self.store_subscriptions(&subscriptions);

        info!("Loaded {} subscriptions from the API", subscriptions.len());
        *self.subscriptions.write() = subscriptions.clone();
        Ok(LoadedSubscriptions {
            subscriptions,
            from_cache: false,
        })
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.read().clone()
    }

    pub async fn search_videos(
        &self,
        filter: &FilterConfig,
        progress: Option<&dyn ProgressSink>,
    ) -> AppResult<PipelineResult> {
        let channel_ids: Vec<String> = self
            .subscriptions
            .read()
            .iter()
            .map(|sub| sub.id.clone())
            .collect();

        if channel_ids.is_empty() {
            return Err(AppError::Precondition(
                "Load your subscriptions before searching".to_string(),
            ));
        }

        Ok(self.pipeline.run(&channel_ids, filter, progress).await)
    }

    pub async fn unsubscribe(&self, channel_id: &str) -> AppResult<()> {
        let source = self.subscription_source()?;
        source.unsubscribe(channel_id).await?;

        let remaining = {
            let mut subscriptions = self.subscriptions.write();
            subscriptions.retain(|sub| sub.id != channel_id);
            subscriptions.clone()
        };
        self.replace_cached_subscriptions(&remaining);

        info!("Unsubscribed from channel {}", channel_id);
        Ok(())
    }

    pub fn clear_cache(&self) -> AppResult<()> {
        self.cache.clear_all()
    }

    /// Per-namespace cache status, keyed by namespace
    pub fn cache_info(&self) -> BTreeMap<String, CacheInfo> {
        BTreeMap::from([(
            SUBSCRIPTIONS_NAMESPACE.to_string(),
            self.cache.info(SUBSCRIPTIONS_NAMESPACE),
        )])
    }

    /// Drops every cached entry and the in-memory list; credentials are revoked elsewhere
    pub fn sign_out(&self) -> AppResult<()> {
        self.subscriptions.write().clear();
        self.cache.clear_all()?;
        info!("Signed out and cleared local data");
        Ok(())
    }

    fn subscription_source(&self) -> AppResult<&Arc<dyn SubscriptionSource>> {
        self.subscription_source.as_ref().ok_or_else(|| {
            AppError::Precondition("Sign in is required to access subscriptions".to_string())
        })
    }

    /// Unknown counts stay at zero when the lookup fails.
    /// Returns whether any count changed.
    async fn backfill_subscriber_counts(&self, subscriptions: &mut [Subscription]) -> bool {
        let channel_ids: Vec<String> = subscriptions
            .iter()
            .filter(|sub| sub.needs_subscriber_count())
            .map(|sub| sub.id.clone())
            .collect();
        if channel_ids.is_empty() {
            return false;
        }

        let outcome = self
            .fetcher
            .fetch_channel_stats(self.stats_api.as_ref(), &channel_ids)
            .await;
        let mut changed = false;
        for sub in subscriptions.iter_mut() {
            if let Some(stats) = outcome.stats.get(&sub.id) {
                changed |= sub.subscriber_count != stats.subscriber_count;
                sub.subscriber_count = stats.subscriber_count;
            }
        }
        changed
    }

    /// Cache write failures only cost a refetch next time
    fn store_subscriptions(&self, subscriptions: &[Subscription]) {
        if let Err(e) = self.cache.put(SUBSCRIPTIONS_NAMESPACE, subscriptions) {
            warn!("Failed to cache subscriptions: {}", e);
        }
    }

    /// Edits to a cached list keep the time it was fetched
    fn replace_cached_subscriptions(&self, subscriptions: &[Subscription]) {
        if let Err(e) = self.cache.replace(SUBSCRIPTIONS_NAMESPACE, subscriptions) {
            warn!("Failed to update cached subscriptions: {}", e);
        }
    }
}
