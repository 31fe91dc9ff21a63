//! Pipeline progress signal
//!
//! The orchestrator reports one percentage across all stages. Each stage owns
//! a fixed slice of the 0-100 range; [`ProgressReporter`] guarantees that what
//! a sink observes never goes backwards.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::models::PipelineStage;

pub const CHANNEL_STATS_PERCENT: u8 = 10;
pub const FEED_START_PERCENT: u8 = 30;
pub const FEED_END_PERCENT: u8 = 70;
pub const VIDEO_STATS_PERCENT: u8 = 75;
pub const FILTERING_PERCENT: u8 = 90;
pub const COMPLETE_PERCENT: u8 = 100;

/// One progress event delivered to a sink
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineProgress {
    pub stage: PipelineStage,
    pub message: String,
    pub percent: u8,
}

/// Receives progress events; may be called from within async contexts
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: PipelineProgress);
}

impl ProgressSink for mpsc::UnboundedSender<PipelineProgress> {
    fn report(&self, progress: PipelineProgress) {
        // A dropped receiver only means nobody is watching
        let _ = self.send(progress);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(PipelineProgress) + Send + Sync,
{
    fn report(&self, progress: PipelineProgress) {
        self(progress)
    }
}

/// Percentage inside the feed-collection slice for `completed` of `total` channels
pub fn feed_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return FEED_END_PERCENT;
    }
    let span = (FEED_END_PERCENT - FEED_START_PERCENT) as usize;
    let within = completed.min(total) * span / total;
    FEED_START_PERCENT + within as u8
}

/// Monotonic front for an optional sink
pub struct ProgressReporter<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last_percent: u8,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self {
            sink,
            last_percent: 0,
        }
    }

    pub fn report(&mut self, stage: PipelineStage, message: impl Into<String>, percent: u8) {
        let percent = percent.min(COMPLETE_PERCENT).max(self.last_percent);
        self.last_percent = percent;

        let message = message.into();
        debug!("Progress {}%: {}", percent, message);
        if let Some(sink) = self.sink {
            sink.report(PipelineProgress {
                stage,
                message,
                percent,
            });
        }
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }
}
