//! Application configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::feed_collector::{
    FeedCollectorConfig, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_FETCHES,
};
use super::models::FilterConfig;
use super::stats_fetcher::MAX_BATCH_SIZE;

pub const ENV_API_KEY: &str = "YOUTUBE_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "YOUTUBE_ACCESS_TOKEN";
pub const ENV_CACHE_DIR: &str = "VIDEO_SCOUT_CACHE_DIR";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Main application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub feed: FeedConfig,
    pub search: FilterConfig,
    pub cache: CacheConfig,
    pub advanced: AdvancedConfig,
}

/// Remote statistics / subscriptions API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Key for public statistics lookups; the access token is used when absent
    pub api_key: Option<String>,
    /// OAuth bearer token for the signed-in user
    pub access_token: Option<String>,
    pub base_url: String,
    pub batch_size: usize,
    pub timeout_seconds: u64,
}

/// Public channel feed fetching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub max_concurrent_fetches: usize,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Platform cache directory when unset
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvancedConfig {
    pub log_level: String, // "error", "warn", "info", "debug", "trace"
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            access_token: None,
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            batch_size: MAX_BATCH_SIZE,
            timeout_seconds: 30,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            timeout_seconds: DEFAULT_FETCH_TIMEOUT_SECS,
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn collector_config(&self) -> FeedCollectorConfig {
        FeedCollectorConfig {
            max_concurrent: self.max_concurrent_fetches,
            fetch_timeout: Duration::from_secs(self.timeout_seconds),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform config file, or defaults when there is none.
    /// Environment overrides are applied on top; nothing is ever written.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        let mut config = if config_path.exists() {
            let config = Self::load_from(&config_path)?;
            tracing::info!("Loaded configuration from: {:?}", config_path);
            config
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
            .validate()
            .with_context(|| "Configuration is invalid")?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&content).with_context(|| "Failed to parse config file")
    }

    /// Overrides credentials and cache location from `lookup` (the process environment in practice)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = non_empty(ENV_API_KEY) {
            self.api.api_key = Some(api_key);
        }
        if let Some(token) = non_empty(ENV_ACCESS_TOKEN) {
            self.api.access_token = Some(token);
        }
        if let Some(directory) = non_empty(ENV_CACHE_DIR) {
            self.cache.directory = Some(directory);
        }
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let project_dirs = Self::project_dirs()?;
        Ok(project_dirs.config_dir().join("config.json"))
    }

    /// Configured cache directory, or the platform cache directory
    pub fn cache_directory(&self) -> Result<PathBuf> {
        match self.cache.directory {
            Some(ref directory) => Ok(PathBuf::from(directory)),
            None => Ok(Self::project_dirs()?.cache_dir().to_path_buf()),
        }
    }

    /// Export configuration as JSON string
    pub fn export(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "Failed to export configuration")
    }

    /// Parse and validate configuration from a JSON string
    pub fn import(json: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(json).with_context(|| "Failed to parse imported configuration")?;

        config
            .validate()
            .with_context(|| "Imported configuration is invalid")?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.api.batch_size == 0 || self.api.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!("API batch size should be between 1 and {}", MAX_BATCH_SIZE);
        }

        if self.api.timeout_seconds == 0 {
            anyhow::bail!("API timeout must be greater than 0");
        }

        if url::Url::parse(&self.api.base_url).is_err() {
            anyhow::bail!("Invalid API base URL: {}", self.api.base_url);
        }

        if !(1..=100).contains(&self.feed.max_concurrent_fetches) {
            anyhow::bail!("Concurrent feed fetches should be between 1 and 100");
        }

        if !(1..=120).contains(&self.feed.timeout_seconds) {
            anyhow::bail!("Feed timeout should be between 1 and 120 seconds");
        }

        if self.search.mutation_ratio < 0.0 || !self.search.mutation_ratio.is_finite() {
            anyhow::bail!("Mutation ratio must be a non-negative number");
        }

        if !LOG_LEVELS.contains(&self.advanced.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level: must be 'error', 'warn', 'info', 'debug', or 'trace'"
            );
        }

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "videoscout", "video-scout")
            .with_context(|| "Failed to get project directories")
    }
}
