//! Discovery pipeline orchestrator
//!
//! Channel stats -> feed collection -> video stats -> filter & rank. Every
//! stage degrades to partial results; the orchestrator itself always returns
//! a [`PipelineResult`] whose `failures` list names what was skipped.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::feed_collector::FeedCollector;
use crate::core::filter_engine::filter_and_rank;
use crate::core::models::{FilterConfig, PipelineResult, PipelineStage};
use crate::core::progress::{
    feed_percent, ProgressReporter, ProgressSink, CHANNEL_STATS_PERCENT, COMPLETE_PERCENT,
    FEED_START_PERCENT, FILTERING_PERCENT, VIDEO_STATS_PERCENT,
};
use crate::core::stats_fetcher::{BatchStatsFetcher, StatsApi};

pub struct DiscoveryPipeline {
    stats_api: Arc<dyn StatsApi>,
    collector: FeedCollector,
    fetcher: BatchStatsFetcher,
}

impl DiscoveryPipeline {
    pub fn new(
        stats_api: Arc<dyn StatsApi>,
        collector: FeedCollector,
        fetcher: BatchStatsFetcher,
    ) -> Self {
        Self {
            stats_api,
            collector,
            fetcher,
        }
    }

    pub async fn run(
        &self,
        channel_ids: &[String],
        filter: &FilterConfig,
        progress: Option<&dyn ProgressSink>,
    ) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let reporter = Mutex::new(ProgressReporter::new(progress));
        let mut result = PipelineResult::default();

        if channel_ids.is_empty() {
            info!("Run {}: no channels to search", run_id);
            reporter
                .lock()
                .report(PipelineStage::Complete, "No channels to search", COMPLETE_PERCENT);
            return result;
        }

        info!(
            "Run {}: searching {} channels with {:?}",
            run_id,
            channel_ids.len(),
            filter.policy()
        );

        // 获取频道统计信息
        reporter.lock().report(
            PipelineStage::ChannelStats,
            "Fetching channel statistics",
            CHANNEL_STATS_PERCENT,
        );
        let channel_stats = self
            .fetcher
            .fetch_channel_stats(self.stats_api.as_ref(), channel_ids)
            .await;
        result.failures.extend(channel_stats.failures);

        reporter.lock().report(
            PipelineStage::FeedCollection,
            format!("Fetching feeds for {} channels", channel_ids.len()),
            FEED_START_PERCENT,
        );
        let on_channel_done = |completed: usize, total: usize| {
            reporter.lock().report(
                PipelineStage::FeedCollection,
                format!("Fetched feeds {}/{}", completed, total),
                feed_percent(completed, total),
            );
        };
        let collection = self
            .collector
            .collect(channel_ids, filter.days_within, Some(&on_channel_done))
            .await;
        result.failures.extend(collection.failures);
        let candidates = collection.videos;

        if candidates.is_empty() {
            info!("Run {}: no recent videos found", run_id);
            reporter
                .lock()
                .report(PipelineStage::Complete, "No recent videos found", COMPLETE_PERCENT);
            return result;
        }

        // Duplicate candidates share one lookup key
        let mut seen = HashSet::new();
        let video_ids: Vec<String> = candidates
            .iter()
            .filter(|c| seen.insert(c.video_id.as_str()))
            .map(|c| c.video_id.clone())
            .collect();

        reporter.lock().report(
            PipelineStage::VideoStats,
            format!("Fetching statistics for {} videos", video_ids.len()),
            VIDEO_STATS_PERCENT,
        );
        let video_stats = self
            .fetcher
            .fetch_video_stats(self.stats_api.as_ref(), &video_ids)
            .await;
        result.failures.extend(video_stats.failures);

        reporter.lock().report(
            PipelineStage::Filtering,
            "Filtering and ranking",
            FILTERING_PERCENT,
        );
        let outcome = filter_and_rank(
            &candidates,
            &channel_stats.stats,
            &video_stats.stats,
            &filter.policy(),
        );

        result.ranked = outcome.ranked;
        result.total_seen = outcome.total_seen;
        result.total_kept = outcome.total_kept;

        if !result.failures.is_empty() {
            warn!(
                "Run {}: completed with {} skipped units",
                run_id,
                result.failures.len()
            );
        }
        info!(
            "Run {}: kept {} of {} videos",
            run_id, result.total_kept, result.total_seen
        );
        reporter.lock().report(
            PipelineStage::Complete,
            format!("Found {} videos", result.total_kept),
            COMPLETE_PERCENT,
        );
        result
    }
}
