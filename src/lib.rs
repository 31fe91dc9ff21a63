//! Video Scout - Core Library
//!
//! Discovers recently published videos across a user's subscribed channels,
//! enriches them with channel and video statistics and ranks them by
//! subscriber/view criteria.

pub mod clients;
pub mod commands;
pub mod core;
pub mod parsers;
pub mod utils;

// Re-export commonly used types
pub use core::{
    cache::{CacheInfo, FileCacheStore, TtlCache},
    config::AppConfig,
    feed_collector::FeedCollector,
    models::{
        AppError, AppResult, FilterConfig, PipelineResult, RankedVideo, Subscription, UnitFailure,
    },
    pipeline::DiscoveryPipeline,
    progress::{PipelineProgress, ProgressSink},
    session::{DiscoverySession, SubscriptionSource},
    stats_fetcher::{BatchStatsFetcher, StatsApi},
};

use std::sync::Arc;

use clients::{HttpFeedSource, YoutubeApiClient};

/// Application state shared between commands
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub session: Arc<DiscoverySession>,
}

impl AppState {
    /// Wires the HTTP clients, file cache and pipeline from `config`
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        // 创建API和RSS客户端
        let api = Arc::new(
            YoutubeApiClient::new(&config.api, &config.feed.user_agent)
                .map_err(|e| anyhow::anyhow!("Failed to create API client: {}", e))?,
        );
        let feeds = Arc::new(
            HttpFeedSource::new(&config.feed)
                .map_err(|e| anyhow::anyhow!("Failed to create feed client: {}", e))?,
        );

        // 初始化缓存目录
        let cache_dir = config.cache_directory()?;
        tracing::debug!("Using cache directory: {:?}", cache_dir);
        let cache = TtlCache::new(Arc::new(FileCacheStore::new(cache_dir)));

        let fetcher = BatchStatsFetcher::new(config.api.batch_size);
        let collector = FeedCollector::new(feeds, config.feed.collector_config());
        let pipeline = DiscoveryPipeline::new(api.clone(), collector, fetcher);

        let subscription_source: Option<Arc<dyn SubscriptionSource>> =
            if api.has_user_credentials() {
                Some(api.clone() as Arc<dyn SubscriptionSource>)
            } else {
                tracing::warn!("No access token configured, subscription features are disabled");
                None
            };

        let session = DiscoverySession::new(subscription_source, api, fetcher, pipeline, cache);
        Ok(Self::with_session(config, session))
    }

    pub fn with_session(config: AppConfig, session: DiscoverySession) -> Self {
        Self {
            config: Arc::new(config),
            session: Arc::new(session),
        }
    }

    /// Loads configuration from disk, falling back to defaults when it is unreadable or invalid
    pub fn load_or_default_config() -> AppConfig {
        match AppConfig::load() {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(
                    "Failed to load configuration: {:#}. Using defaults",
                    err
                );
                let mut cfg = AppConfig::default();
                cfg.apply_env_overrides(|key| std::env::var(key).ok());
                cfg
            }
        }
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize the library with default settings
pub fn init() -> anyhow::Result<()> {
    // 初始化日志系统（如果还没有初始化）
    utils::logging::init_tracing(None);
    tracing::info!("📚 {} v{} initialized", NAME, VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
        // repeated initialisation is ignored
        assert!(init().is_ok());
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "video-scout");
    }

    #[tokio::test]
    async fn test_app_state_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.cache.directory = Some(dir.path().to_string_lossy().into_owned());

        let state = AppState::new(config).unwrap();
        assert!(state.session.subscriptions().is_empty());
        assert!(!state.session.cache_info()["subscriptions"].exists);
    }
}
