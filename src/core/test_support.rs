//! In-memory fakes for the remote capabilities, shared by the integration tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::feed_collector::FeedSource;
use super::models::{AppError, AppResult, Subscription};
use super::session::SubscriptionSource;
use super::stats_fetcher::{StatsApi, StatsKind};

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

/// Atom document with one entry per `(video_id, published)` pair
pub fn feed_xml(author: &str, entries: &[(&str, &str)]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns="http://www.w3.org/2005/Atom">
 <title>{author}</title>
 <author><name>{author}</name></author>
"#
    );
    for (video_id, published) in entries {
        xml.push_str(&format!(
            r#" <entry>
  <yt:videoId>{video_id}</yt:videoId>
  <title>Video {video_id}</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v={video_id}"/>
  <author><name>{author}</name></author>
  <published>{published}</published>
 </entry>
"#
        ));
    }
    xml.push_str("</feed>");
    xml
}

pub enum FeedBehavior {
    Document(String),
    Fail,
    Hang,
    Panic,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Feed source scripted per channel; unknown channels fail
#[derive(Default)]
pub struct FakeFeedSource {
    behaviors: HashMap<String, FeedBehavior>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with(mut self, channel_id: &str, behavior: FeedBehavior) -> Self {
        self.behaviors.insert(channel_id.to_string(), behavior);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for FakeFeedSource {
    async fn fetch_feed(&self, channel_id: &str) -> AppResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.behaviors.get(channel_id) {
            Some(FeedBehavior::Document(xml)) => Ok(xml.clone().into_bytes()),
            Some(FeedBehavior::Fail) | None => Err(AppError::Api {
                status: 404,
                message: format!("no feed for {}", channel_id),
            }),
            Some(FeedBehavior::Hang) => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
            Some(FeedBehavior::Panic) => panic!("feed worker exploded for {}", channel_id),
        }
    }
}

/// Statistics API backed by fixed tables
#[derive(Default)]
pub struct FakeStatsApi {
    subscribers: HashMap<String, u64>,
    videos: HashMap<String, (u64, u64)>,
    fail_videos: bool,
    calls: Mutex<Vec<(StatsKind, usize)>>,
}

impl FakeStatsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(mut self, channel_id: &str, subscribers: u64) -> Self {
        self.subscribers.insert(channel_id.to_string(), subscribers);
        self
    }

    /// `duration_seconds` is served as an ISO-8601 token
    pub fn video(mut self, video_id: &str, views: u64, duration_seconds: u64) -> Self {
        self.videos
            .insert(video_id.to_string(), (views, duration_seconds));
        self
    }

    pub fn failing_videos(mut self) -> Self {
        self.fail_videos = true;
        self
    }

    pub fn calls(&self) -> Vec<(StatsKind, usize)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StatsApi for FakeStatsApi {
    async fn list_items(&self, kind: StatsKind, ids: &[String]) -> AppResult<Vec<Value>> {
        assert!(ids.len() <= 50, "batch of {} ids exceeds the API cap", ids.len());
        self.calls.lock().push((kind, ids.len()));

        let items = match kind {
            StatsKind::Channels => ids
                .iter()
                .filter_map(|id| {
                    self.subscribers.get(id).map(|subs| {
                        json!({
                            "id": id,
                            "snippet": { "title": format!("Channel {}", id) },
                            "statistics": { "subscriberCount": subs.to_string() }
                        })
                    })
                })
                .collect(),
            StatsKind::Videos => {
                if self.fail_videos {
                    return Err(AppError::Api {
                        status: 403,
                        message: "quotaExceeded".to_string(),
                    });
                }
                ids.iter()
                    .filter_map(|id| {
                        self.videos.get(id).map(|(views, duration)| {
                            json!({
                                "id": id,
                                "statistics": { "viewCount": views.to_string(), "likeCount": "1" },
                                "contentDetails": { "duration": format!("PT{}S", duration) }
                            })
                        })
                    })
                    .collect()
            }
        };
        Ok(items)
    }
}

#[derive(Default)]
pub struct FakeSubscriptionSource {
    subscriptions: Vec<Subscription>,
    list_calls: AtomicUsize,
    unsubscribed: Mutex<Vec<String>>,
}

impl FakeSubscriptionSource {
    pub fn new(channel_ids: &[&str]) -> Self {
        Self {
            subscriptions: channel_ids
                .iter()
                .map(|id| Subscription::new(*id, format!("Channel {}", id), "", "about"))
                .collect(),
            ..Self::default()
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().clone()
    }
}

#[async_trait]
impl SubscriptionSource for FakeSubscriptionSource {
    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.subscriptions.clone())
    }

    async fn unsubscribe(&self, channel_id: &str) -> AppResult<()> {
        self.unsubscribed.lock().push(channel_id.to_string());
        Ok(())
    }
}
