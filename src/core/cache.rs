//! Time-to-live cache for subscription lists and channel data
//!
//! Entries are stored per logical namespace as `{cached_at, data}` JSON
//! records. An entry is valid while `now < cached_at + 24h`; expired entries
//! read as absent but are left in place until the next write replaces them.
//! Any record that fails to decode also reads as absent, so callers simply
//! re-fetch.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::clock::{Clock, SystemClock};
use crate::core::models::{AppError, AppResult};

/// Fixed validity window of every cache entry
pub const CACHE_TTL_HOURS: i64 = 24;

/// Namespace holding the user's subscription list
pub const SUBSCRIPTIONS_NAMESPACE: &str = "subscriptions";

/// File suffix marking entries owned by [`FileCacheStore`]
pub const CACHE_FILE_SUFFIX: &str = ".cache.json";

/// Raw byte storage addressed by namespace
pub trait CacheStore: Send + Sync {
    fn read(&self, namespace: &str) -> AppResult<Option<Vec<u8>>>;
    fn write(&self, namespace: &str, bytes: &[u8]) -> AppResult<()>;
    fn remove(&self, namespace: &str) -> AppResult<()>;
    fn remove_all(&self) -> AppResult<()>;
}

/// One `<namespace>.cache.json` file per namespace inside a cache directory.
/// Other files in the directory are never touched.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    directory: PathBuf,
}

impl FileCacheStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, namespace: &str) -> AppResult<PathBuf> {
        validate_namespace(namespace)?;
        Ok(self
            .directory
            .join(format!("{}{}", namespace, CACHE_FILE_SUFFIX)))
    }
}

/// True for file names this store writes, including interrupted temp files
fn is_cache_file(file_name: &str) -> bool {
    let stem = file_name
        .strip_suffix(".tmp")
        .unwrap_or(file_name)
        .strip_suffix(CACHE_FILE_SUFFIX);
    matches!(stem, Some(namespace) if validate_namespace(namespace).is_ok())
}

impl CacheStore for FileCacheStore {
    fn read(&self, namespace: &str) -> AppResult<Option<Vec<u8>>> {
        let path = self.entry_path(namespace)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, namespace: &str, bytes: &[u8]) -> AppResult<()> {
        let path = self.entry_path(namespace)?;
        std::fs::create_dir_all(&self.directory)?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, namespace: &str) -> AppResult<()> {
        let path = self.entry_path(namespace)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_all(&self) -> AppResult<()> {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let owned = entry.file_name().to_str().map_or(false, is_cache_file);
            if owned && entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

/// In-process store, used when no cache directory is available and in tests
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self, namespace: &str) -> AppResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(namespace).cloned())
    }

    fn write(&self, namespace: &str, bytes: &[u8]) -> AppResult<()> {
        validate_namespace(namespace)?;
        self.entries
            .write()
            .insert(namespace.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, namespace: &str) -> AppResult<()> {
        self.entries.write().remove(namespace);
        Ok(())
    }

    fn remove_all(&self) -> AppResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

fn validate_namespace(namespace: &str) -> AppResult<()> {
    let valid = !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Cache(format!(
            "invalid cache namespace: {:?}",
            namespace
        )))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    cached_at: DateTime<Utc>,
    data: serde_json::Value,
}

/// Observability snapshot of one namespace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub exists: bool,
    pub cached_at: Option<DateTime<Utc>>,
    /// Only present when the payload is a collection
    pub item_count: Option<usize>,
}

impl CacheInfo {
    fn missing() -> Self {
        Self {
            exists: false,
            cached_at: None,
            item_count: None,
        }
    }
}

pub struct TtlCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::hours(CACHE_TTL_HOURS),
        }
    }

    /// Store `payload` stamped with the current time, replacing any previous entry
    pub fn put<T: Serialize + ?Sized>(&self, namespace: &str, payload: &T) -> AppResult<()> {
        self.write_entry(namespace, self.clock.now(), payload)
    }

    /// Rewrite the payload but keep the existing timestamp, so edits never
    /// extend the entry's lifetime. Missing entries are stamped now.
    pub fn replace<T: Serialize + ?Sized>(&self, namespace: &str, payload: &T) -> AppResult<()> {
        let cached_at = self
            .load_entry(namespace)
            .map(|entry| entry.cached_at)
            .unwrap_or_else(|| self.clock.now());
        self.write_entry(namespace, cached_at, payload)
    }

    fn write_entry<T: Serialize + ?Sized>(
        &self,
        namespace: &str,
        cached_at: DateTime<Utc>,
        payload: &T,
    ) -> AppResult<()> {
        let entry = CacheEntry {
            cached_at,
            data: serde_json::to_value(payload)
                .map_err(|e| AppError::Cache(format!("failed to encode payload: {}", e)))?,
        };
        let bytes = serde_json::to_vec_pretty(&entry)
            .map_err(|e| AppError::Cache(format!("failed to encode entry: {}", e)))?;

        self.store.write(namespace, &bytes)?;
        info!("Cached {} ({})", namespace, describe_count(&entry.data));
        Ok(())
    }

    /// Payload of a still-valid entry, or `None` when missing, expired or undecodable
    pub fn get<T: DeserializeOwned>(&self, namespace: &str) -> Option<T> {
        let entry = self.load_entry(namespace)?;

        if self.clock.now() >= entry.cached_at + self.ttl {
            debug!("Cache entry {} expired (cached at {})", namespace, entry.cached_at);
            return None;
        }

        match serde_json::from_value(entry.data) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("Cache entry {} has unexpected shape: {}", namespace, e);
                None
            }
        }
    }

    pub fn clear(&self, namespace: &str) -> AppResult<()> {
        self.store.remove(namespace)?;
        info!("Cleared cache entry {}", namespace);
        Ok(())
    }

    pub fn clear_all(&self) -> AppResult<()> {
        self.store.remove_all()?;
        info!("Cleared all cache entries");
        Ok(())
    }

    /// Reports on the stored record regardless of expiry
    pub fn info(&self, namespace: &str) -> CacheInfo {
        match self.load_entry(namespace) {
            Some(entry) => CacheInfo {
                exists: true,
                cached_at: Some(entry.cached_at),
                item_count: collection_len(&entry.data),
            },
            None => CacheInfo::missing(),
        }
    }

    fn load_entry(&self, namespace: &str) -> Option<CacheEntry> {
        let bytes = match self.store.read(namespace) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", namespace, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", namespace, e);
                None
            }
        }
    }
}

fn collection_len(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::Array(items) => Some(items.len()),
        serde_json::Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn describe_count(value: &serde_json::Value) -> String {
    match collection_len(value) {
        Some(count) => format!("{} items", count),
        None => "scalar".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use tempfile::TempDir;

    fn memory_cache() -> (TtlCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = TtlCache::with_clock(Arc::new(MemoryCacheStore::new()), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_get_after_put_returns_payload() {
        let (cache, _clock) = memory_cache();
        let payload = vec!["a".to_string(), "b".to_string()];

        cache.put("channels", &payload).unwrap();
        let loaded: Option<Vec<String>> = cache.get("channels");
        assert_eq!(loaded, Some(payload));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (cache, clock) = memory_cache();
        cache.put(SUBSCRIPTIONS_NAMESPACE, &vec![1, 2, 3]).unwrap();

        clock.advance(Duration::hours(23) + Duration::minutes(59));
        assert!(cache.get::<Vec<i32>>(SUBSCRIPTIONS_NAMESPACE).is_some());

        clock.advance(Duration::minutes(1));
        assert!(cache.get::<Vec<i32>>(SUBSCRIPTIONS_NAMESPACE).is_none());

        // Expired records are not deleted
        let info = cache.info(SUBSCRIPTIONS_NAMESPACE);
        assert!(info.exists);
        assert_eq!(info.item_count, Some(3));
    }

    #[test]
    fn test_put_overwrites_and_restamps() {
        let (cache, clock) = memory_cache();
        cache.put("videos", &vec![1]).unwrap();
        clock.advance(Duration::hours(30));
        assert!(cache.get::<Vec<i32>>("videos").is_none());

        cache.put("videos", &vec![1, 2]).unwrap();
        assert_eq!(cache.get::<Vec<i32>>("videos"), Some(vec![1, 2]));
        assert_eq!(cache.info("videos").cached_at, Some(clock.now()));
    }

    #[test]
    fn test_replace_keeps_original_timestamp() {
        let (cache, clock) = memory_cache();
        let stamped = clock.now();
        cache.put("subscriptions", &vec![1]).unwrap();

        clock.advance(Duration::hours(23));
        cache.replace("subscriptions", &vec![1, 2]).unwrap();
        assert_eq!(cache.get::<Vec<i32>>("subscriptions"), Some(vec![1, 2]));
        assert_eq!(cache.info("subscriptions").cached_at, Some(stamped));

        clock.advance(Duration::hours(1));
        assert!(cache.get::<Vec<i32>>("subscriptions").is_none());

        cache.replace("fresh", &vec![3]).unwrap();
        assert_eq!(cache.info("fresh").cached_at, Some(clock.now()));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (cache, _clock) = memory_cache();
        cache.clear("nothing").unwrap();
        cache.clear_all().unwrap();

        cache.put("a", &1).unwrap();
        cache.clear("a").unwrap();
        cache.clear("a").unwrap();
        assert!(cache.get::<i32>("a").is_none());
        assert!(!cache.info("a").exists);
    }

    #[test]
    fn test_scalar_payload_has_no_item_count() {
        let (cache, _clock) = memory_cache();
        cache.put("flag", &true).unwrap();
        let info = cache.info("flag");
        assert!(info.exists);
        assert_eq!(info.item_count, None);
    }

    #[test]
    fn test_wrong_shape_reads_as_absent() {
        let (cache, _clock) = memory_cache();
        cache.put("numbers", &vec![1, 2]).unwrap();
        assert!(cache.get::<String>("numbers").is_none());
    }

    #[test]
    fn test_file_store_roundtrip_and_corruption() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileCacheStore::new(dir.path().join("cache")));
        let cache = TtlCache::new(store.clone());

        assert!(cache.get::<Vec<String>>(SUBSCRIPTIONS_NAMESPACE).is_none());
        cache
            .put(SUBSCRIPTIONS_NAMESPACE, &vec!["UC1".to_string()])
            .unwrap();
        assert_eq!(
            cache.get::<Vec<String>>(SUBSCRIPTIONS_NAMESPACE),
            Some(vec!["UC1".to_string()])
        );

        std::fs::write(
            store.directory().join("subscriptions.cache.json"),
            b"{ not json",
        )
        .unwrap();
        assert!(cache.get::<Vec<String>>(SUBSCRIPTIONS_NAMESPACE).is_none());
        assert!(!cache.info(SUBSCRIPTIONS_NAMESPACE).exists);

        cache.put("channels", &vec![1]).unwrap();
        cache.clear_all().unwrap();
        assert!(!cache.info("channels").exists);
        assert!(!store.directory().join("subscriptions.cache.json").exists());
    }

    #[test]
    fn test_clear_all_keeps_foreign_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("notes.json"), b"[]").unwrap();
        std::fs::write(dir.path().join("odd.name.cache.json"), b"{}").unwrap();

        let cache = TtlCache::new(Arc::new(FileCacheStore::new(dir.path())));
        cache.put(SUBSCRIPTIONS_NAMESPACE, &vec![1, 2]).unwrap();
        cache.put("channels", &vec![3]).unwrap();
        std::fs::write(dir.path().join("videos.cache.json.tmp"), b"{").unwrap();

        cache.clear_all().unwrap();

        assert!(!cache.info(SUBSCRIPTIONS_NAMESPACE).exists);
        assert!(!cache.info("channels").exists);
        assert!(!dir.path().join("videos.cache.json.tmp").exists());
        assert!(dir.path().join("config.json").exists());
        assert!(dir.path().join("notes.json").exists());
        // not a valid namespace, so not ours
        assert!(dir.path().join("odd.name.cache.json").exists());
    }

    #[test]
    fn test_invalid_namespace_is_rejected() {
        let dir = TempDir::new().unwrap();
        let cache = TtlCache::new(Arc::new(FileCacheStore::new(dir.path())));
        assert!(cache.put("../escape", &1).is_err());
        assert!(cache.get::<i32>("../escape").is_none());
    }
}
