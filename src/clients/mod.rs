//! HTTP implementations of the remote capabilities the core depends on

pub mod rss_feed;
pub mod youtube_api;

pub use rss_feed::HttpFeedSource;
pub use youtube_api::YoutubeApiClient;
