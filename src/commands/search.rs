//! Video search command handler

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::core::models::{FilterConfig, RankedVideo, UnitFailure};
use crate::core::progress::ProgressSink;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    /// Candidates examined before filtering
    pub total: usize,
    pub filtered: usize,
}

/// Search result in the shape the UI consumes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub videos: Vec<RankedVideo>,
    pub stats: SearchStats,
    /// Channels and batches skipped along the way
    pub failures: Vec<UnitFailure>,
}

/// Search recent videos across loaded subscriptions.
/// Without a filter the configured default applies.
pub async fn search_videos(
    state: &AppState,
    filter: Option<FilterConfig>,
    progress: Option<&dyn ProgressSink>,
) -> Result<SearchResponse, String> {
    let filter = filter.unwrap_or_else(|| state.config.search.clone());
    info!("🔍 Searching videos with filter: {:?}", filter);

    match state.session.search_videos(&filter, progress).await {
        Ok(result) => {
            if !result.failures.is_empty() {
                warn!("⚠️ Search skipped {} units", result.failures.len());
            }
            info!(
                "✅ Search finished: {} of {} videos kept",
                result.total_kept, result.total_seen
            );
            Ok(SearchResponse {
                videos: result.ranked,
                stats: SearchStats {
                    total: result.total_seen,
                    filtered: result.total_kept,
                },
                failures: result.failures,
            })
        }
        Err(e) => {
            error!("❌ Search failed: {}", e);
            Err(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_state;
    use crate::core::progress::PipelineProgress;
    use crate::core::test_support::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_search_before_loading_fails() {
        let state = test_state(
            Some(FakeSubscriptionSource::new(&["UC1"])),
            FakeStatsApi::new(),
            FakeFeedSource::new(),
        );
        let err = search_videos(&state, None, None).await.unwrap_err();
        assert!(err.contains("Load your subscriptions"));
    }

    #[tokio::test]
    async fn test_search_response_shape() {
        let state = test_state(
            Some(FakeSubscriptionSource::new(&["UC1", "UC2"])),
            FakeStatsApi::new()
                .channel("UC1", 5_000)
                .video("v1", 20_000, 300)
                .video("v2", 20_000, 120),
            FakeFeedSource::new()
                .with(
                    "UC1",
                    FeedBehavior::Document(feed_xml(
                        "One",
                        &[
                            ("v1", "2024-06-14T00:00:00+00:00"),
                            ("v2", "2024-06-14T00:00:00+00:00"),
                        ],
                    )),
                )
                .with("UC2", FeedBehavior::Fail),
        );
        crate::commands::load_subscriptions(&state, false)
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel::<PipelineProgress>();
        let response = search_videos(&state, None, Some(&tx)).await.unwrap();

        assert_eq!(response.stats.total, 2);
        assert_eq!(response.stats.filtered, 1);
        assert_eq!(response.videos[0].video_id, "v1");
        assert_eq!(response.failures.len(), 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["stats"]["filtered"], 1);
        assert_eq!(json["videos"][0]["videoId"], "v1");
        assert_eq!(json["videos"][0]["duration"], 300);

        drop(tx);
        let mut last = 0;
        while let Some(event) = rx.recv().await {
            assert!(event.percent >= last);
            last = event.percent;
        }
        assert_eq!(last, 100);
    }
}
