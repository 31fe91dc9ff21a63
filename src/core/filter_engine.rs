//! Filter & rank engine
//!
//! Joins candidates with channel and video statistics, applies the selected
//! policy and orders survivors by view count.

use std::collections::HashMap;

use tracing::debug;

use crate::core::models::{CandidateVideo, ChannelStats, FilterPolicy, RankedVideo, VideoStats};

/// Videos shorter than this are short-form and never ranked
pub const MIN_DURATION_SECONDS: u64 = 181;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedOutcome {
    pub ranked: Vec<RankedVideo>,
    pub total_seen: usize,
    pub total_kept: usize,
}

/// Candidates are examined in input order. The sort is stable, so equal view
/// counts keep their encounter order and the output is deterministic.
pub fn filter_and_rank(
    candidates: &[CandidateVideo],
    channel_stats: &HashMap<String, ChannelStats>,
    video_stats: &HashMap<String, VideoStats>,
    policy: &FilterPolicy,
) -> RankedOutcome {
    let mut ranked: Vec<RankedVideo> = candidates
        .iter()
        .filter_map(|candidate| rank_candidate(candidate, channel_stats, video_stats, policy))
        .collect();

    ranked.sort_by(|a, b| b.view_count.cmp(&a.view_count));

    debug!(
        "Kept {} of {} candidates under {:?}",
        ranked.len(),
        candidates.len(),
        policy
    );

    RankedOutcome {
        total_seen: candidates.len(),
        total_kept: ranked.len(),
        ranked,
    }
}

fn rank_candidate(
    candidate: &CandidateVideo,
    channel_stats: &HashMap<String, ChannelStats>,
    video_stats: &HashMap<String, VideoStats>,
    policy: &FilterPolicy,
) -> Option<RankedVideo> {
    let video = video_stats.get(&candidate.video_id)?;
    if video.duration_seconds < MIN_DURATION_SECONDS {
        return None;
    }
    let channel = channel_stats.get(&candidate.channel_id)?;

    let subscribers = channel.subscriber_count;
    let views = video.view_count;
    let keep = match *policy {
        FilterPolicy::Normal {
            max_subscribers,
            min_views,
        } => subscribers <= max_subscribers && views >= min_views,
        FilterPolicy::Ratio { mutation_ratio } => {
            subscribers > 0 && views as f64 / subscribers as f64 >= mutation_ratio
        }
    };
    if !keep {
        return None;
    }

    let channel_title = if channel.title.is_empty() {
        candidate.channel_title.clone()
    } else {
        channel.title.clone()
    };

    Some(RankedVideo {
        video_id: candidate.video_id.clone(),
        title: candidate.title.clone(),
        channel_id: candidate.channel_id.clone(),
        channel_title,
        thumbnail_url: candidate.thumbnail_url.clone(),
        published_at: candidate.published_at,
        view_count: views,
        like_count: video.like_count,
        subscriber_count: subscribers,
        duration_seconds: video.duration_seconds,
        ratio: view_ratio(views, subscribers),
    })
}

/// views / subscribers rounded to two decimals; 0 without subscribers
pub fn view_ratio(views: u64, subscribers: u64) -> f64 {
    if subscribers == 0 {
        return 0.0;
    }
    (views as f64 / subscribers as f64 * 100.0).round() / 100.0
}
