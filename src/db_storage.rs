use crate::cache_store::{persistable, CacheStore};
use crate::confidence::SourceInfo;
use crate::errors::{AppError, ResultExt};
use crate::models::{CacheEntry, GeoLocation};
use crate::sources::AuditSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed cache store.
///
/// Both tables are written with `INSERT ... ON CONFLICT DO UPDATE`, so
/// concurrent misses on one key resolve to the last write.
#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get_map_data(&self, key: &str) -> Result<Option<CacheEntry>, AppError> {
        let row = sqlx::query_as::<_, (String, String, String, String, DateTime<Utc>)>(
            r#"
            SELECT query_hash, query, response, checksum, expires_at
            FROM map_data_cache
            WHERE query_hash = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row.map(|(key, query, payload, checksum, expires_at)| CacheEntry {
            key,
            query,
            payload,
            checksum,
            expires_at,
        }))
    }

    async fn put_map_data(&self, entry: &CacheEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO map_data_cache (query_hash, query, response, checksum, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (query_hash) DO UPDATE
            SET response = EXCLUDED.response,
                checksum = EXCLUDED.checksum,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&entry.key)
        .bind(&entry.query)
        .bind(&entry.payload)
        .bind(&entry.checksum)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert map_data_cache {}", entry.key))?;

        Ok(())
    }

    async fn get_geocode(&self, address: &str) -> Result<Option<GeoLocation>, AppError> {
        let row = sqlx::query_as::<_, (f64, f64, String, String)>(
            "SELECT lat, lng, normalized, provider FROM geocoding_cache WHERE address = $1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row.map(|(lat, lng, normalized, provider)| {
            GeoLocation::new(lat, lng, normalized, &provider)
        }))
    }

    async fn put_geocode(&self, address: &str, geo: &GeoLocation) -> Result<(), AppError> {
        let geo = persistable(geo);
        sqlx::query(
            r#"
            INSERT INTO geocoding_cache (address, lat, lng, normalized, provider)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (address) DO UPDATE
            SET lat = EXCLUDED.lat,
                lng = EXCLUDED.lng,
                normalized = EXCLUDED.normalized,
                provider = EXCLUDED.provider
            "#,
        )
        .bind(address)
        .bind(geo.lat)
        .bind(geo.lng)
        .bind(&geo.address_normalized)
        .bind(&geo.provider)
        .execute(&self.pool)
        .await
        .context("upsert geocoding_cache")?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM map_data_cache WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("purge map_data_cache")?;

        Ok(result.rows_affected())
    }
}

/// Audit sink writing to the `audit_log` table.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Audit trail for one tax identifier, newest first.
    pub async fn trail(&self, piva: &str) -> Result<Vec<(String, serde_json::Value, String)>, AppError> {
        sqlx::query_as::<_, (String, serde_json::Value, String)>(
            "SELECT field, value, confidence FROM audit_log WHERE piva = $1 ORDER BY recorded_at DESC",
        )
        .bind(piva)
        .fetch_all(&self.pool)
        .await
        .context("read audit_log")
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(
        &self,
        piva: &str,
        field: &str,
        value: serde_json::Value,
        source: &SourceInfo,
        correlation_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, piva, field, value, source, method, confidence, recorded_at, request_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(piva)
        .bind(field)
        .bind(value)
        .bind(&source.source)
        .bind(&source.method)
        .bind(source.confidence.as_str())
        .bind(source.timestamp)
        .bind(correlation_id)
        .execute(&self.pool)
        .await
        .context("insert audit_log")?;

        Ok(())
    }
}
