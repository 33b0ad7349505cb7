use crate::cache_store::CacheStore;
use crate::cache_validator::query_hash;
use crate::clock::Clock;
use crate::errors::{AppError, ResultExt};
use crate::models::CacheEntry;
use crate::rate_limiter::RateLimitQueue;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Cached, rate-limited access to the map-data source.
///
/// A live, intact entry for the query hash is returned without touching the
/// queue. A miss runs the fetcher through the shared queue and persists the
/// response with `now + ttl` before returning it. Failed fetches are never
/// cached.
#[derive(Clone)]
pub struct MapDataGateway {
    store: Arc<dyn CacheStore>,
    queue: RateLimitQueue,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl MapDataGateway {
    pub fn new(
        store: Arc<dyn CacheStore>,
        queue: RateLimitQueue,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            store,
            queue,
            clock,
            ttl,
        }
    }

    pub async fn fetch_cached<F, Fut>(&self, query: &str, fetcher: F) -> Result<Value, AppError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, AppError>> + Send + 'static,
    {
        let key = query_hash(query);

        if let Some(cached) = self.lookup(&key).await? {
            tracing::debug!("Map-data cache hit: {}", key);
            return Ok(cached);
        }

        tracing::debug!("Map-data cache miss: {}, queueing fetch", key);
        let response = self.queue.submit(fetcher).await??;

        let payload = serde_json::to_string(&response)?;
        let entry = CacheEntry::new(query, payload, self.clock.now() + self.ttl);
        self.store
            .put_map_data(&entry)
            .await
            .context("Failed to store map-data response")?;

        Ok(response)
    }

    async fn lookup(&self, key: &str) -> Result<Option<Value>, AppError> {
        let entry = self
            .store
            .get_map_data(key)
            .await
            .context("Failed to read map-data cache")?;

        let Some(entry) = entry else {
            return Ok(None);
        };
        let Some(payload) = entry.validated_payload(self.clock.now()) else {
            return Ok(None);
        };

        match serde_json::from_str(payload) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Discarding unparseable cached payload {}: {}", key, e);
                Ok(None)
            }
        }
    }
}
