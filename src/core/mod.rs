//! Core business logic module
//!
//! This module contains the domain models, the discovery pipeline stages and
//! the session that ties them to a signed-in user.

pub mod cache;
pub mod clock;
pub mod config;
pub mod duration;
pub mod feed_collector;
pub mod filter_engine;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod stats_fetcher;

#[cfg(test)]
pub(crate) mod test_support;




// Re-export commonly used types
pub use config::AppConfig;
pub use pipeline::DiscoveryPipeline;
pub use session::DiscoverySession;
