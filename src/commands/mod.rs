//! Command handlers
//!
//! The operations a UI layer (or the CLI) invokes. Each handler logs its
//! outcome and reports failures as plain messages.

pub mod cache;
pub mod search;
pub mod subscriptions;

// Re-export all command functions for easy access
pub use cache::*;
pub use search::*;
pub use subscriptions::*;

#[cfg(test)]
pub(crate) fn test_state(
    source: Option<crate::core::test_support::FakeSubscriptionSource>,
    stats: crate::core::test_support::FakeStatsApi,
    feeds: crate::core::test_support::FakeFeedSource,
) -> crate::AppState {
    use crate::core::cache::{MemoryCacheStore, TtlCache};
    use crate::core::clock::ManualClock;
    use crate::core::feed_collector::{FeedCollector, FeedCollectorConfig};
    use crate::core::test_support::at;
    use crate::{AppConfig, BatchStatsFetcher, DiscoveryPipeline, DiscoverySession, SubscriptionSource};
    use std::sync::Arc;

    let clock = Arc::new(ManualClock::new(at("2024-06-15T00:00:00Z")));
    let stats = Arc::new(stats);
    let collector =
        FeedCollector::with_clock(Arc::new(feeds), FeedCollectorConfig::default(), clock.clone());
    let pipeline = DiscoveryPipeline::new(stats.clone(), collector, BatchStatsFetcher::default());
    let cache = TtlCache::with_clock(Arc::new(MemoryCacheStore::new()), clock);
    let source = source.map(|s| Arc::new(s) as Arc<dyn SubscriptionSource>);

    let session = DiscoverySession::new(
        source,
        stats,
        BatchStatsFetcher::default(),
        pipeline,
        cache,
    );
    crate::AppState::with_session(AppConfig::default(), session)
}
