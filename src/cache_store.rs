use crate::errors::AppError;
use crate::models::{CacheEntry, GeoLocation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;

/// Durable key-value store behind the map-data and geocoding caches.
///
/// Writes are upserts: concurrent misses on the same key both write and the
/// last writer wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Map-data entry by query hash, expired or not. Freshness is the
    /// caller's decision.
    async fn get_map_data(&self, key: &str) -> Result<Option<CacheEntry>, AppError>;

    async fn put_map_data(&self, entry: &CacheEntry) -> Result<(), AppError>;

    /// Geocoding result by raw address. Geocodes never expire.
    async fn get_geocode(&self, address: &str) -> Result<Option<GeoLocation>, AppError>;

    async fn put_geocode(&self, address: &str, geo: &GeoLocation) -> Result<(), AppError>;

    /// Deletes map-data entries that expired at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Strips the per-request fields that must never be persisted.
pub(crate) fn persistable(geo: &GeoLocation) -> GeoLocation {
    GeoLocation {
        elevation_m: None,
        street_view_url: None,
        ..geo.clone()
    }
}

/// In-process store backed by moka, used without a database and in tests.
#[derive(Clone)]
pub struct InMemoryCacheStore {
    map_data: Cache<String, CacheEntry>,
    geocodes: Cache<String, GeoLocation>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Bounds the map-data cache only. Geocodes never expire, so that cache
    /// is unbounded and never evicts.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            map_data: Cache::builder().max_capacity(max_capacity).build(),
            geocodes: Cache::builder().build(),
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get_map_data(&self, key: &str) -> Result<Option<CacheEntry>, AppError> {
        Ok(self.map_data.get(key).await)
    }

    async fn put_map_data(&self, entry: &CacheEntry) -> Result<(), AppError> {
        self.map_data.insert(entry.key.clone(), entry.clone()).await;
        Ok(())
    }

    async fn get_geocode(&self, address: &str) -> Result<Option<GeoLocation>, AppError> {
        Ok(self.geocodes.get(address).await)
    }

    async fn put_geocode(&self, address: &str, geo: &GeoLocation) -> Result<(), AppError> {
        self.geocodes
            .insert(address.to_string(), persistable(geo))
            .await;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let expired: Vec<String> = self
            .map_data
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in &expired {
            self.map_data.invalidate(key).await;
        }
        Ok(expired.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_map_data_upsert_last_writer_wins() {
        let store = InMemoryCacheStore::new();
        let expires = Utc::now() + Duration::hours(24);

        store
            .put_map_data(&CacheEntry::new("q", "{\"v\":1}".to_string(), expires))
            .await
            .unwrap();
        store
            .put_map_data(&CacheEntry::new("q", "{\"v\":2}".to_string(), expires))
            .await
            .unwrap();

        let entry = store
            .get_map_data(&crate::cache_validator::query_hash("q"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.payload, "{\"v\":2}");
    }

    #[tokio::test]
    async fn test_geocode_drops_ephemeral_fields() {
        let store = InMemoryCacheStore::new();
        let mut geo = GeoLocation::new(45.46, 9.19, "Via Roma 1, Milano", "nominatim");
        geo.elevation_m = Some(120.0);
        geo.street_view_url = Some("https://example.test/sv".to_string());

        store.put_geocode("Via Roma 1", &geo).await.unwrap();
        let cached = store.get_geocode("Via Roma 1").await.unwrap().unwrap();

        assert_eq!(cached.lat, 45.46);
        assert_eq!(cached.elevation_m, None);
        assert_eq!(cached.street_view_url, None);
        assert!(store.get_geocode("Via Roma 1 ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryCacheStore::new();
        let now = Utc::now();
        store
            .put_map_data(&CacheEntry::new("old", "{}".to_string(), now - Duration::hours(1)))
            .await
            .unwrap();
        store
            .put_map_data(&CacheEntry::new("new", "{}".to_string(), now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store
            .get_map_data(&crate::cache_validator::query_hash("new"))
            .await
            .unwrap()
            .is_some());
    }
}
