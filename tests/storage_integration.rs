use chrono::{Duration, SubsecRound, Utc};
use std::env;
use uuid::Uuid;

use rust_catnat_prefill::cache_store::CacheStore;
use rust_catnat_prefill::confidence::{Confidence, SourceInfo};
use rust_catnat_prefill::db::Database;
use rust_catnat_prefill::db_storage::{PgAuditSink, PgCacheStore};
use rust_catnat_prefill::models::{CacheEntry, GeoLocation};
use rust_catnat_prefill::sources::AuditSink;

async fn connect() -> anyhow::Result<Database> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    db.ensure_schema().await?;
    Ok(db)
}

/// Round-trips both caches through Postgres and purges an expired entry.
/// Marked ignored because it needs a live database; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn pg_cache_store_smoke_test() -> anyhow::Result<()> {
    let db = connect().await?;
    let store = PgCacheStore::new(db.pool.clone());

    // Unique query text so repeated runs do not collide.
    let query = format!("[out:json];/* {} */", Uuid::new_v4());
    // Postgres keeps microseconds; whole seconds compare exactly.
    let now = Utc::now().trunc_subsecs(0);

    let entry = CacheEntry::new(&query, r#"{"elements":[]}"#.to_string(), now + Duration::hours(24));
    store.put_map_data(&entry).await?;
    assert_eq!(store.get_map_data(&entry.key).await?, Some(entry.clone()));

    // Upsert replaces the previous row
    let replaced = CacheEntry::new(&query, r#"{"elements":[1]}"#.to_string(), now - Duration::seconds(1));
    store.put_map_data(&replaced).await?;
    let stored = store.get_map_data(&entry.key).await?.expect("row exists");
    assert!(stored.is_intact());
    assert!(!stored.is_live(now));

    assert!(store.purge_expired(now).await? >= 1);
    assert!(store.get_map_data(&entry.key).await?.is_none());

    let address = format!("Via Test {}, 20100 Milano (MI)", Uuid::new_v4());
    let mut geo = GeoLocation::new(45.46, 9.19, "Via Test, Milano", "nominatim");
    geo.elevation_m = Some(120.0);
    geo.street_view_url = Some("https://example.test/streetview".to_string());
    store.put_geocode(&address, &geo).await?;

    let cached = store.get_geocode(&address).await?.expect("geocode cached");
    assert_eq!(cached.lat, 45.46);
    assert_eq!(cached.provider, "nominatim");
    assert!(cached.elevation_m.is_none());
    assert!(cached.street_view_url.is_none());

    Ok(())
}

#[tokio::test]
#[ignore]
async fn pg_audit_sink_smoke_test() -> anyhow::Result<()> {
    let db = connect().await?;
    let sink = PgAuditSink::new(db.pool.clone());

    let piva = format!("9{:010}", Uuid::new_v4().as_u128() % 10_000_000_000);
    let source = SourceInfo::new("OSM", "polygon geometry", Confidence::High);
    sink.record(&piva, "building.area_m2", serde_json::json!(1500.0), &source, Uuid::new_v4())
        .await?;

    let trail = sink.trail(&piva).await?;
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].0, "building.area_m2");
    assert_eq!(trail[0].2, "HIGH");

    Ok(())
}
