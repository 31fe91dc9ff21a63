//! Cache command handlers

use std::collections::BTreeMap;
use tracing::{error, info};

use crate::core::cache::CacheInfo;
use crate::AppState;

/// Delete every cache entry
pub async fn clear_cache(state: &AppState) -> Result<(), String> {
    info!("🧹 Clearing cache");

    match state.session.clear_cache() {
        Ok(()) => {
            info!("✅ Cache cleared");
            Ok(())
        }
        Err(e) => {
            error!("❌ Failed to clear cache: {}", e);
            Err(e.to_string())
        }
    }
}

/// Cache status per namespace
pub async fn get_cache_info(state: &AppState) -> Result<BTreeMap<String, CacheInfo>, String> {
    Ok(state.session.cache_info())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_state;
    use crate::core::test_support::*;

    #[tokio::test]
    async fn test_cache_info_and_clear() {
        let state = test_state(
            Some(FakeSubscriptionSource::new(&["UC1", "UC2", "UC3"])),
            FakeStatsApi::new(),
            FakeFeedSource::new(),
        );

        let info = get_cache_info(&state).await.unwrap();
        assert!(!info["subscriptions"].exists);

        crate::commands::load_subscriptions(&state, false)
            .await
            .unwrap();
        let info = get_cache_info(&state).await.unwrap();
        assert!(info["subscriptions"].exists);
        assert_eq!(info["subscriptions"].item_count, Some(3));
        assert!(info["subscriptions"].cached_at.is_some());

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["subscriptions"]["itemCount"], 3);

        clear_cache(&state).await.unwrap();
        let info = get_cache_info(&state).await.unwrap();
        assert!(!info["subscriptions"].exists);
        // loaded subscriptions survive a cache clear
        assert_eq!(state.session.subscriptions().len(), 3);
    }
}
