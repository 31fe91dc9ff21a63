//! Batched statistics lookups against the quota-limited remote API
//!
//! IDs are split into consecutive chunks of at most [`MAX_BATCH_SIZE`], one
//! remote call per chunk, one chunk after another. A failed chunk is logged
//! and recorded; its IDs are simply missing from the result map.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::core::duration::parse_duration;
use crate::core::models::{AppResult, ChannelStats, PipelineStage, UnitFailure, VideoStats};

/// The remote API rejects more IDs than this per call
pub const MAX_BATCH_SIZE: usize = 50;

/// Which statistics endpoint a batch targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatsKind {
    Channels,
    Videos,
}

impl StatsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::Videos => "videos",
        }
    }

    fn stage(&self) -> PipelineStage {
        match self {
            Self::Channels => PipelineStage::ChannelStats,
            Self::Videos => PipelineStage::VideoStats,
        }
    }
}

/// Remote statistics capability; authentication is the implementor's concern
#[async_trait]
pub trait StatsApi: Send + Sync {
    /// Raw items for at most [`MAX_BATCH_SIZE`] IDs
    async fn list_items(&self, kind: StatsKind, ids: &[String]) -> AppResult<Vec<Value>>;
}

/// A statistics record decodable from one raw API item
pub trait StatsRecord: Sized {
    /// `None` when the item carries no ID
    fn from_item(item: &Value) -> Option<(String, Self)>;
}

impl StatsRecord for ChannelStats {
    fn from_item(item: &Value) -> Option<(String, Self)> {
        let channel_id = item_id(item)?;
        let stats = ChannelStats {
            channel_id: channel_id.clone(),
            subscriber_count: parse_count(&item["statistics"]["subscriberCount"]),
            title: item["snippet"]["title"].as_str().unwrap_or("").to_string(),
            thumbnail_url: item["snippet"]["thumbnails"]["default"]["url"]
                .as_str()
                .unwrap_or("")
                .to_string(),
        };
        Some((channel_id, stats))
    }
}

impl StatsRecord for VideoStats {
    fn from_item(item: &Value) -> Option<(String, Self)> {
        let video_id = item_id(item)?;
        let stats = VideoStats {
            video_id: video_id.clone(),
            view_count: parse_count(&item["statistics"]["viewCount"]),
            like_count: parse_count(&item["statistics"]["likeCount"]),
            comment_count: parse_count(&item["statistics"]["commentCount"]),
            duration_seconds: parse_duration(
                item["contentDetails"]["duration"].as_str().unwrap_or("PT0S"),
            ),
        };
        Some((video_id, stats))
    }
}

fn item_id(item: &Value) -> Option<String> {
    item["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Counts arrive as strings (sometimes numbers); absent or unparsable is 0
pub fn parse_count(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Merged result of a batched lookup
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub stats: HashMap<String, T>,
    pub failures: Vec<UnitFailure>,
    /// Number of remote calls issued
    pub calls: usize,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            stats: HashMap::new(),
            failures: Vec::new(),
            calls: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchStatsFetcher {
    batch_size: usize,
}

impl Default for BatchStatsFetcher {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl BatchStatsFetcher {
    /// Batch sizes outside `1..=MAX_BATCH_SIZE` are clamped
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Runs `caller` once per chunk of `ids`, in order, and merges decoded items by ID
    pub async fn fetch<T, F, Fut>(
        &self,
        stage: PipelineStage,
        ids: &[String],
        mut caller: F,
    ) -> BatchOutcome<T>
    where
        T: StatsRecord,
        F: FnMut(Vec<String>) -> Fut,
        Fut: Future<Output = AppResult<Vec<Value>>>,
    {
        let mut outcome = BatchOutcome::default();
        if ids.is_empty() {
            return outcome;
        }

        let total_batches = ids.len().div_ceil(self.batch_size);
        for (index, chunk) in ids.chunks(self.batch_size).enumerate() {
            outcome.calls += 1;
            match caller(chunk.to_vec()).await {
                Ok(items) => {
                    let before = outcome.stats.len();
                    for item in &items {
                        if let Some((id, record)) = T::from_item(item) {
                            outcome.stats.insert(id, record);
                        }
                    }
                    debug!(
                        "Batch {}/{} returned {} items ({} new)",
                        index + 1,
                        total_batches,
                        items.len(),
                        outcome.stats.len() - before
                    );
                }
                Err(e) => {
                    warn!(
                        "Stats batch {}/{} ({} ids) failed: {}",
                        index + 1,
                        total_batches,
                        chunk.len(),
                        e
                    );
                    outcome
                        .failures
                        .push(UnitFailure::new(stage, chunk.join(","), e.into()));
                }
            }
        }

        outcome
    }

    pub async fn fetch_channel_stats(
        &self,
        api: &dyn StatsApi,
        channel_ids: &[String],
    ) -> BatchOutcome<ChannelStats> {
        self.fetch_kind(api, StatsKind::Channels, channel_ids).await
    }

    pub async fn fetch_video_stats(
        &self,
        api: &dyn StatsApi,
        video_ids: &[String],
    ) -> BatchOutcome<VideoStats> {
        self.fetch_kind(api, StatsKind::Videos, video_ids).await
    }

    async fn fetch_kind<T: StatsRecord>(
        &self,
        api: &dyn StatsApi,
        kind: StatsKind,
        ids: &[String],
    ) -> BatchOutcome<T> {
        let outcome = self
            .fetch(kind.stage(), ids, |batch| async move {
                api.list_items(kind, &batch).await
            })
            .await;

        info!(
            "Fetched {} stats for {}/{} ids in {} calls ({} failed)",
            kind.as_str(),
            outcome.stats.len(),
            ids.len(),
            outcome.calls,
            outcome.failures.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::AppError;
    use serde_json::json;
    use std::sync::Mutex;

    fn ids(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("id{:03}", i)).collect()
    }

    fn video_item(id: &str, views: &str) -> Value {
        json!({
            "id": id,
            "statistics": { "viewCount": views, "likeCount": "7" },
            "contentDetails": { "duration": "PT4M1S" }
        })
    }

    #[tokio::test]
    async fn test_partitions_into_capped_batches() {
        let sizes = Mutex::new(Vec::new());
        let fetcher = BatchStatsFetcher::new(50);

        let outcome: BatchOutcome<VideoStats> = fetcher
            .fetch(PipelineStage::VideoStats, &ids(120), |batch| {
                sizes.lock().unwrap().push(batch.len());
                let items: Vec<Value> = batch.iter().map(|id| video_item(id, "10")).collect();
                async move { Ok::<_, AppError>(items) }
            })
            .await;

        assert_eq!(*sizes.lock().unwrap(), vec![50, 50, 20]);
        assert_eq!(outcome.calls, 3);
        assert_eq!(outcome.stats.len(), 120);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_is_skipped() {
        let mut call = 0;
        let fetcher = BatchStatsFetcher::default();
        let input = ids(120);

        let outcome: BatchOutcome<VideoStats> = fetcher
            .fetch(PipelineStage::VideoStats, &input, |batch| {
                call += 1;
                let failing = call == 2;
                let items: Vec<Value> = batch.iter().map(|id| video_item(id, "10")).collect();
                async move {
                    if failing {
                        Err(AppError::Api {
                            status: 403,
                            message: "quotaExceeded".into(),
                        })
                    } else {
                        Ok(items)
                    }
                }
            })
            .await;

        assert_eq!(outcome.calls, 3);
        assert_eq!(outcome.stats.len(), 70);
        assert!(outcome.stats.contains_key("id000"));
        assert!(!outcome.stats.contains_key("id050"));
        assert!(outcome.stats.contains_key("id119"));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].stage, PipelineStage::VideoStats);
        assert!(outcome.failures[0].unit.starts_with("id050,id051"));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let mut called = false;
        let outcome: BatchOutcome<ChannelStats> = BatchStatsFetcher::default()
            .fetch(PipelineStage::ChannelStats, &[], |_| {
                called = true;
                async { Ok::<_, AppError>(Vec::new()) }
            })
            .await;
        assert!(!called);
        assert_eq!(outcome.calls, 0);
        assert!(outcome.stats.is_empty());
    }

    #[test]
    fn test_batch_size_is_clamped() {
        assert_eq!(BatchStatsFetcher::new(0).batch_size(), 1);
        assert_eq!(BatchStatsFetcher::new(500).batch_size(), MAX_BATCH_SIZE);
    }

    #[test]
    fn test_channel_record_decoding() {
        let item = json!({
            "id": "UC1",
            "snippet": { "title": "Chan", "thumbnails": { "default": { "url": "https://t" } } },
            "statistics": { "subscriberCount": "1234" }
        });
        let (id, stats) = ChannelStats::from_item(&item).unwrap();
        assert_eq!(id, "UC1");
        assert_eq!(stats.subscriber_count, 1234);
        assert_eq!(stats.title, "Chan");
        assert_eq!(stats.thumbnail_url, "https://t");

        // hidden subscriber counts arrive without the field
        let hidden = json!({ "id": "UC2", "statistics": { "hiddenSubscriberCount": true } });
        let (_, stats) = ChannelStats::from_item(&hidden).unwrap();
        assert_eq!(stats.subscriber_count, 0);
        assert_eq!(stats.title, "");

        assert!(ChannelStats::from_item(&json!({ "statistics": {} })).is_none());
    }

    #[test]
    fn test_video_record_decoding_defaults() {
        let (_, stats) = VideoStats::from_item(&video_item("v1", "9001")).unwrap();
        assert_eq!(stats.view_count, 9001);
        assert_eq!(stats.like_count, 7);
        assert_eq!(stats.comment_count, 0);
        assert_eq!(stats.duration_seconds, 241);

        let (_, bare) = VideoStats::from_item(&json!({ "id": "v2" })).unwrap();
        assert_eq!(bare.view_count, 0);
        assert_eq!(bare.duration_seconds, 0);
    }

    #[test]
    fn test_parse_count_variants() {
        assert_eq!(parse_count(&json!("42")), 42);
        assert_eq!(parse_count(&json!(42)), 42);
        assert_eq!(parse_count(&json!("not a number")), 0);
        assert_eq!(parse_count(&json!(null)), 0);
        assert_eq!(parse_count(&json!(-3)), 0);
    }

    struct FakeApi;

    #[async_trait]
    impl StatsApi for FakeApi {
        async fn list_items(&self, kind: StatsKind, ids: &[String]) -> AppResult<Vec<Value>> {
            assert_eq!(kind, StatsKind::Channels);
            Ok(ids
                .iter()
                .map(|id| json!({ "id": id, "statistics": { "subscriberCount": "5" } }))
                .collect())
        }
    }

    #[test]
    fn test_fetch_channel_stats_through_trait() {
        let outcome = tokio_test::block_on(
            BatchStatsFetcher::new(2).fetch_channel_stats(&FakeApi, &ids(5)),
        );
        assert_eq!(outcome.calls, 3);
        assert_eq!(outcome.stats.len(), 5);
        assert_eq!(outcome.stats["id004"].subscriber_count, 5);
    }
}
