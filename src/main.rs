use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use video_scout::{
    commands,
    core::progress::PipelineProgress,
    utils::logging::init_tracing,
    AppConfig, AppState, FilterConfig,
};

#[derive(Parser)]
#[command(name = "video-scout")]
#[command(version)]
#[command(about = "Find recent breakout videos across your subscribed channels")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (defaults to the platform config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(short = 'v', long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and print subscriptions
    Subscriptions {
        /// Ignore the cached list
        #[arg(long)]
        refresh: bool,
    },
    /// Search recent videos across subscriptions
    Search(SearchArgs),
    /// Unsubscribe from a channel
    Unsubscribe { channel_id: String },
    /// Inspect or clear the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Clear all local data
    SignOut,
}

#[derive(Subcommand)]
enum CacheAction {
    Info,
    Clear,
}

#[derive(Args)]
struct SearchArgs {
    /// "normal" for absolute thresholds, anything else for the ratio policy
    #[arg(long)]
    filter_type: Option<String>,
    #[arg(long)]
    max_subscribers: Option<u64>,
    #[arg(long)]
    min_views: Option<u64>,
    #[arg(long)]
    days_within: Option<u32>,
    #[arg(long)]
    mutation_ratio: Option<f64>,
    /// Reload subscriptions instead of using the cache
    #[arg(long)]
    refresh: bool,
}

impl SearchArgs {
    fn apply(&self, mut filter: FilterConfig) -> FilterConfig {
        if let Some(ref filter_type) = self.filter_type {
            filter.filter_type = filter_type.clone();
        }
        if let Some(max_subscribers) = self.max_subscribers {
            filter.max_subscribers = max_subscribers;
        }
        if let Some(min_views) = self.min_views {
            filter.min_views = min_views;
        }
        if let Some(days_within) = self.days_within {
            filter.days_within = days_within;
        }
        if let Some(mutation_ratio) = self.mutation_ratio {
            filter.mutation_ratio = mutation_ratio;
        }
        filter
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate().with_context(|| "Configuration is invalid")?;
            Ok(config)
        }
        None => Ok(AppState::load_or_default_config()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    init_tracing(Some(
        cli.log_level
            .as_deref()
            .unwrap_or(&config.advanced.log_level),
    ));
    let state = AppState::new(config)?;
    info!("🚀 {} v{} ready", video_scout::NAME, video_scout::VERSION);

    match cli.command {
        Command::Subscriptions { refresh } => {
            let loaded = commands::load_subscriptions(&state, refresh)
                .await
                .map_err(anyhow::Error::msg)?;
            print_json(&loaded)?;
        }

        Command::Search(args) => {
            commands::load_subscriptions(&state, args.refresh)
                .await
                .map_err(anyhow::Error::msg)?;

            let filter = args.apply(state.config.search.clone());
            let (tx, mut rx) = mpsc::unbounded_channel::<PipelineProgress>();
            let reporter = tokio::spawn(async move {
                while let Some(progress) = rx.recv().await {
                    info!("[{:>3}%] {}", progress.percent, progress.message);
                }
            });

            let response = commands::search_videos(&state, Some(filter), Some(&tx)).await;
            drop(tx);
            let _ = reporter.await;

            print_json(&response.map_err(anyhow::Error::msg)?)?;
        }

        Command::Unsubscribe { channel_id } => {
            commands::load_subscriptions(&state, false)
                .await
                .map_err(anyhow::Error::msg)?;
            commands::unsubscribe_channel(&state, channel_id)
                .await
                .map_err(anyhow::Error::msg)?;
        }

        Command::Cache { action } => match action {
            CacheAction::Info => {
                print_json(&commands::get_cache_info(&state).await.map_err(anyhow::Error::msg)?)?
            }
            CacheAction::Clear => commands::clear_cache(&state)
                .await
                .map_err(anyhow::Error::msg)?,
        },

        Command::SignOut => commands::sign_out(&state)
            .await
            .map_err(anyhow::Error::msg)?,
    }

    Ok(())
}
