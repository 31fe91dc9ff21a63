//! Core data models for the video discovery pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum stored length of a subscription description, in characters
pub const DESCRIPTION_MAX_CHARS: usize = 100;

/// A user's subscription to a channel, as cached locally
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,

    pub title: String,

    #[serde(rename = "thumbnail", default)]
    pub thumbnail_url: String,

    #[serde(default)]
    pub description: String,

    /// Zero when unknown; back-filled from channel statistics
    #[serde(default)]
    pub subscriber_count: u64,
}

impl Subscription {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        thumbnail_url: impl Into<String>,
        description: &str,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            thumbnail_url: thumbnail_url.into(),
            description: description.chars().take(DESCRIPTION_MAX_CHARS).collect(),
            subscriber_count: 0,
        }
    }

    pub fn needs_subscriber_count(&self) -> bool {
        self.subscriber_count == 0
    }
}

/// Channel statistics pulled from the remote API for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub channel_id: String,
    pub subscriber_count: u64,
    pub title: String,
    pub thumbnail_url: String,
}

/// A recently published video found in a channel feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateVideo {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
}

/// Video statistics pulled from the remote API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoStats {
    pub video_id: String,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub duration_seconds: u64,
}

/// A candidate that survived filtering, joined with its statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedVideo {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    pub published_at: DateTime<Utc>,
    pub view_count: u64,
    pub like_count: u64,
    pub subscriber_count: u64,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    /// views / subscribers rounded to two decimals, 0 when subscribers is 0
    pub ratio: f64,
}

/// Filter settings supplied by the caller of a search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    /// "normal" selects absolute thresholds; any other tag selects the ratio policy
    pub filter_type: String,
    pub max_subscribers: u64,
    pub min_views: u64,
    pub days_within: u32,
    pub mutation_ratio: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            filter_type: "normal".to_string(),
            max_subscribers: 10_000,
            min_views: 10_000,
            days_within: 15,
            mutation_ratio: 1.0,
        }
    }
}

impl FilterConfig {
    pub fn policy(&self) -> FilterPolicy {
        if self.filter_type == "normal" {
            FilterPolicy::Normal {
                max_subscribers: self.max_subscribers,
                min_views: self.min_views,
            }
        } else {
            FilterPolicy::Ratio {
                mutation_ratio: self.mutation_ratio,
            }
        }
    }
}

/// Selectable filter policy applied by the rank engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterPolicy {
    Normal { max_subscribers: u64, min_views: u64 },
    Ratio { mutation_ratio: f64 },
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ChannelStats,
    FeedCollection,
    VideoStats,
    Filtering,
    Complete,
}

/// Why a single unit of work (one channel feed, one stats batch) contributed nothing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Timeout { seconds: u64 },
    Transport(String),
    Parse(String),
    Worker(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { seconds } => write!(f, "timed out after {}s", seconds),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Parse(msg) => write!(f, "parse error: {}", msg),
            Self::Worker(msg) => write!(f, "worker failed: {}", msg),
        }
    }
}

impl From<AppError> for FailureReason {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Parse(msg) => Self::Parse(msg),
            AppError::Timeout(seconds) => Self::Timeout { seconds },
            other => Self::Transport(other.to_string()),
        }
    }
}

/// A non-fatal failure recorded while the pipeline kept going
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnitFailure {
    pub stage: PipelineStage,

    /// Channel ID for feed failures, comma-joined ID batch for stats failures
    pub unit: String,

    pub reason: FailureReason,
}

impl UnitFailure {
    pub fn new(stage: PipelineStage, unit: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            stage,
            unit: unit.into(),
            reason,
        }
    }
}

/// Outcome of one discovery run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub ranked: Vec<RankedVideo>,
    pub total_seen: usize,
    pub total_kept: usize,
    pub failures: Vec<UnitFailure>,
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
