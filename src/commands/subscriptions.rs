//! Subscription command handlers
//!
//! Loading, listing and removing subscriptions, plus signing out.

use tracing::{error, info};

use crate::core::models::Subscription;
use crate::core::session::LoadedSubscriptions;
use crate::AppState;

/// Load subscriptions, from cache unless `force_refresh` is set
pub async fn load_subscriptions(
    state: &AppState,
    force_refresh: bool,
) -> Result<LoadedSubscriptions, String> {
    info!("📺 Loading subscriptions (force_refresh: {})", force_refresh);

    match state.session.load_subscriptions(force_refresh).await {
        Ok(loaded) => {
            info!(
                "✅ Loaded {} subscriptions (from cache: {})",
                loaded.subscriptions.len(),
                loaded.from_cache
            );
            Ok(loaded)
        }
        Err(e) => {
            error!("❌ Failed to load subscriptions: {}", e);
            Err(e.to_string())
        }
    }
}

/// Currently loaded subscriptions
pub async fn get_subscriptions_list(state: &AppState) -> Result<Vec<Subscription>, String> {
    Ok(state.session.subscriptions())
}

pub async fn unsubscribe_channel(state: &AppState, channel_id: String) -> Result<(), String> {
    info!("🗑️ Unsubscribing from channel: {}", channel_id);

    match state.session.unsubscribe(&channel_id).await {
        Ok(()) => {
            info!("✅ Unsubscribed from channel: {}", channel_id);
            Ok(())
        }
        Err(e) => {
            error!("❌ Failed to unsubscribe from {}: {}", channel_id, e);
            Err(e.to_string())
        }
    }
}

/// Clears cached data and the loaded subscription list
pub async fn sign_out(state: &AppState) -> Result<(), String> {
    info!("👋 Signing out");

    state.session.sign_out().map_err(|e| {
        error!("❌ Failed to sign out: {}", e);
        e.to_string()
    })
}
