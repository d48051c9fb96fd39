//! Single-entry snapshot cache with read-time staleness.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::storage::KeyValueStore;
use crate::types::{Coordinates, WeatherSnapshot};

pub const CACHE_KEY: &str = "weather_cache";
pub const DEFAULT_TTL: Duration = Duration::from_millis(600_000);

/// The last successful fetch and where it was fetched for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub snapshot: WeatherSnapshot,
    pub coords: Coordinates,
    /// Place name resolved when the snapshot was fetched, so a cache hit
    /// renders without a lookup
    pub label: String,
    pub stored_at_ms: i64,
}

impl CacheEntry {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.stored_at_ms)
    }
}

/// Reads and writes the one cached snapshot. Entries are never expired or
/// deleted; stale entries stay readable as a fallback.
///
/// Storage failures never escape: a failed or corrupt read is a miss and a
/// failed write is logged and dropped.
#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
    ttl_ms: i64,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
        }
    }

    pub fn with_default_ttl(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, DEFAULT_TTL)
    }

    pub fn read(&self) -> Option<CacheEntry> {
        let raw = match self.store.get(CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Weather cache unavailable: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Ignoring corrupt weather cache entry: {}", e);
                None
            }
        }
    }

    pub fn write(
        &self,
        snapshot: &WeatherSnapshot,
        coords: Coordinates,
        label: &str,
        now_ms: i64,
    ) {
        let entry = CacheEntry {
            snapshot: snapshot.clone(),
            coords,
            label: label.to_string(),
            stored_at_ms: now_ms,
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize weather cache: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(CACHE_KEY, &json) {
            tracing::warn!("Failed to save weather cache: {}", e);
        }
    }

    pub fn is_fresh(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        entry.age_ms(now_ms) < self.ttl_ms
    }
}
