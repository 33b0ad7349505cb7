//! Deletes expired map-data cache entries.
//!
//! Expired entries are already ignored on read; this only reclaims space.

use chrono::Utc;
use rust_catnat_prefill::cache_store::CacheStore;
use rust_catnat_prefill::config::Config;
use rust_catnat_prefill::db::Database;
use rust_catnat_prefill::db_storage::PgCacheStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_catnat_prefill=info,purge_expired_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let database_url = config
        .database_url
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set to purge the cache"))?;

    let db = Database::new(&database_url).await?;
    db.ensure_schema().await?;

    let store = PgCacheStore::new(db.pool.clone());
    let purged = store.purge_expired(Utc::now()).await?;
    tracing::info!("Purged {} expired map-data cache entries", purged);

    Ok(())
}
