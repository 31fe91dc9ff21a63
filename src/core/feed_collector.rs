//! Concurrent channel feed collection
//!
//! Every channel's public feed is fetched under a shared concurrency cap,
//! each fetch with its own timeout. Workers only produce per-channel results;
//! the coordinating loop is the single place they are merged and progress is
//! reported, so progress counts are strictly increasing even though
//! completion order follows network timing. Videos are laid out in input
//! channel order, which keeps downstream ranking deterministic.
//!
//! A channel whose fetch times out, fails, or cannot be parsed contributes no
//! videos and never affects other channels.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::core::clock::{Clock, SystemClock};
use crate::core::models::{AppResult, CandidateVideo, FailureReason, PipelineStage, UnitFailure};
use crate::parsers::feed_parser::{parse_feed, FeedEntry};

/// Public feed endpoint, parameterised only by channel ID
pub const FEED_URL_TEMPLATE: &str = "https://www.youtube.com/feeds/videos.xml?channel_id={}";

/// The feed source never lists more than this many entries
pub const MAX_ENTRIES_PER_FEED: usize = 15;

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 20;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

pub fn feed_url(channel_id: &str) -> String {
    FEED_URL_TEMPLATE.replace("{}", channel_id)
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{}/mqdefault.jpg", video_id)
}

/// Raw feed document capability
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_feed(&self, channel_id: &str) -> AppResult<Vec<u8>>;
}

/// Invoked as `(channels_completed, total_channels)` after each channel finishes
pub type ChannelProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCollectorConfig {
    /// Upper bound on simultaneously in-flight feed requests
    pub max_concurrent: usize,
    /// Per-channel fetch timeout
    pub fetch_timeout: Duration,
}

impl Default for FeedCollectorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_FETCHES,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

/// Flat candidate list plus the channels that contributed nothing because they failed
#[derive(Debug, Clone, Default)]
pub struct FeedCollection {
    pub videos: Vec<CandidateVideo>,
    pub failures: Vec<UnitFailure>,
    pub channels_completed: usize,
}

impl FeedCollection {
    /// Counts the channel as completed; failures are recorded, videos handed back
    fn absorb(
        &mut self,
        channel_id: String,
        outcome: Result<Vec<CandidateVideo>, FailureReason>,
    ) -> Option<Vec<CandidateVideo>> {
        self.channels_completed += 1;
        match outcome {
            Ok(videos) => {
                debug!("Channel {} contributed {} videos", channel_id, videos.len());
                Some(videos)
            }
            Err(reason) => {
                warn!("Feed for channel {} skipped: {}", channel_id, reason);
                self.failures.push(UnitFailure::new(
                    PipelineStage::FeedCollection,
                    channel_id,
                    reason,
                ));
                None
            }
        }
    }
}

pub struct FeedCollector {
    source: Arc<dyn FeedSource>,
    config: FeedCollectorConfig,
    clock: Arc<dyn Clock>,
}

impl FeedCollector {
    pub fn new(source: Arc<dyn FeedSource>, config: FeedCollectorConfig) -> Self {
        Self::with_clock(source, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn FeedSource>,
        config: FeedCollectorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &FeedCollectorConfig {
        &self.config
    }

    /// Collects videos published within `within_days` from every channel.
    ///
    /// Runs the fetches concurrently when a tokio runtime is available and
    /// falls back to fetching one channel after another otherwise.
    pub async fn collect(
        &self,
        channel_ids: &[String],
        within_days: u32,
        on_progress: Option<&ChannelProgressFn<'_>>,
    ) -> FeedCollection {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("No async runtime available, collecting feeds sequentially");
            return self
                .collect_sequential(channel_ids, within_days, on_progress)
                .await;
        }

        let total = channel_ids.len();
        let cutoff = self.cutoff(within_days);
        // 限制同时进行的请求数
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut workers = JoinSet::new();

        info!(
            "Collecting feeds for {} channels (max {} in flight)",
            total,
            self.config.max_concurrent.max(1)
        );

        for (index, channel_id) in channel_ids.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let channel_id = channel_id.clone();
            let fetch_timeout = self.config.fetch_timeout;
            let now = self.clock.now();

            workers.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        AssertUnwindSafe(fetch_channel(
                            source.as_ref(),
                            &channel_id,
                            Some(fetch_timeout),
                            cutoff,
                            now,
                        ))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(FailureReason::Worker(panic_message(&*panic))))
                    }
                    Err(e) => Err(FailureReason::Worker(e.to_string())),
                };
                (index, channel_id, outcome)
            });
        }

        let mut collection = FeedCollection::default();
        let mut per_channel: Vec<Vec<CandidateVideo>> = vec![Vec::new(); total];
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, channel_id, outcome)) => {
                    if let Some(videos) = collection.absorb(channel_id, outcome) {
                        per_channel[index] = videos;
                    }
                }
                Err(e) => {
                    // Workers catch their own panics; only cancellation lands here
                    collection.absorb(
                        "<unknown channel>".to_string(),
                        Err(FailureReason::Worker(e.to_string())),
                    );
                }
            }
            if let Some(on_progress) = on_progress {
                on_progress(collection.channels_completed, total);
            }
        }
        collection.videos = per_channel.into_iter().flatten().collect();

        info!(
            "Collected {} candidate videos from {} channels ({} failed)",
            collection.videos.len(),
            total,
            collection.failures.len()
        );
        collection
    }

    /// One channel at a time, same error tolerance and progress semantics.
    ///
    /// Timeouts are only enforced when a tokio timer is available; otherwise
    /// the feed source's own request timeout applies.
    pub async fn collect_sequential(
        &self,
        channel_ids: &[String],
        within_days: u32,
        on_progress: Option<&ChannelProgressFn<'_>>,
    ) -> FeedCollection {
        let total = channel_ids.len();
        let cutoff = self.cutoff(within_days);
        let fetch_timeout = tokio::runtime::Handle::try_current()
            .ok()
            .map(|_| self.config.fetch_timeout);

        let mut collection = FeedCollection::default();
        for channel_id in channel_ids {
            let outcome = fetch_channel(
                self.source.as_ref(),
                channel_id,
                fetch_timeout,
                cutoff,
                self.clock.now(),
            )
            .await;
            if let Some(videos) = collection.absorb(channel_id.clone(), outcome) {
                collection.videos.extend(videos);
            }
            if let Some(on_progress) = on_progress {
                on_progress(collection.channels_completed, total);
            }
        }
        collection
    }

    /// Blocking entry point for callers outside any async runtime.
    ///
    /// Prefers a multi-threaded runtime; if that cannot be built, fetches
    /// sequentially on a current-thread runtime. If no runtime can be built at
    /// all, every channel is recorded as failed and the result is empty.
    /// Must not be called from inside an async runtime; use [`Self::collect`] there.
    pub fn collect_blocking(
        &self,
        channel_ids: &[String],
        within_days: u32,
        on_progress: Option<&ChannelProgressFn<'_>>,
    ) -> FeedCollection {
        match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => {
                return runtime.block_on(self.collect(channel_ids, within_days, on_progress))
            }
            Err(e) => warn!(
                "Failed to start concurrent feed runtime ({}), falling back to sequential",
                e
            ),
        }

        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.collect_sequential(
                channel_ids,
                within_days,
                on_progress,
            )),
            Err(e) => {
                error!("Failed to start any feed runtime: {}", e);
                let mut collection = FeedCollection::default();
                for channel_id in channel_ids {
                    collection.absorb(
                        channel_id.clone(),
                        Err(FailureReason::Worker(format!("runtime unavailable: {}", e))),
                    );
                    if let Some(on_progress) = on_progress {
                        on_progress(collection.channels_completed, channel_ids.len());
                    }
                }
                collection
            }
        }
    }

    fn cutoff(&self, within_days: u32) -> DateTime<Utc> {
        self.clock.now() - ChronoDuration::days(i64::from(within_days))
    }
}

async fn fetch_channel(
    source: &dyn FeedSource,
    channel_id: &str,
    fetch_timeout: Option<Duration>,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateVideo>, FailureReason> {
    let document = match fetch_timeout {
        Some(limit) => tokio::time::timeout(limit, source.fetch_feed(channel_id))
            .await
            .map_err(|_| FailureReason::Timeout {
                seconds: limit.as_secs(),
            })??,
        None => source.fetch_feed(channel_id).await?,
    };

    let feed = parse_feed(&document)?;
    let channel_title = feed.author.clone().unwrap_or_default();

    let videos = feed
        .entries
        .iter()
        .take(MAX_ENTRIES_PER_FEED)
        .filter_map(|entry| candidate_from_entry(entry, channel_id, &channel_title, cutoff, now))
        .collect();
    Ok(videos)
}

/// Entries are not assumed to be sorted; each one is checked on its own
fn candidate_from_entry(
    entry: &FeedEntry,
    channel_id: &str,
    channel_title: &str,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<CandidateVideo> {
    let published_at = entry
        .published
        .as_deref()
        .and_then(parse_published)
        .unwrap_or(now);
    if published_at < cutoff {
        return None;
    }

    let video_id = entry
        .video_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| entry.link.as_deref().and_then(video_id_from_link))?;

    Some(CandidateVideo {
        thumbnail_url: thumbnail_url(&video_id),
        video_id,
        title: entry.title.clone(),
        channel_id: channel_id.to_string(),
        channel_title: entry
            .author
            .clone()
            .unwrap_or_else(|| channel_title.to_string()),
        published_at,
    })
}

fn parse_published(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `v` query parameter of a watch link
pub fn video_id_from_link(link: &str) -> Option<String> {
    if let Ok(url) = url::Url::parse(link) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.is_empty());
    }

    let (_, rest) = link.split_once("v=")?;
    let id = rest.split('&').next().unwrap_or("");
    (!id.is_empty()).then(|| id.to_string())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}
