//! Startup wiring: picks one implementation per collaborator from the
//! configuration and builds the shared state and routes.

use crate::cache_store::{CacheStore, InMemoryCacheStore};
use crate::clock::SystemClock;
use crate::config::{Config, RegistrySource};
use crate::db::Database;
use crate::db_storage::{PgAuditSink, PgCacheStore};
use crate::enrichment::PrefillPipeline;
use crate::geocoding::{CachedGeocoder, NominatimGeocoder};
use crate::google::GoogleMapsClient;
use crate::handlers::{self, AppState};
use crate::map_data::MapDataGateway;
use crate::osm::OsmBuildingSource;
use crate::overpass::OverpassClient;
use crate::rate_limiter::RateLimitQueue;
use crate::registry::{CervedRegistry, MockRegistry};
use crate::sources::{
    AuditSink, BuildingSource, CompanyRegistry, ElevationProvider, Geocoder, MapDataSource,
    StreetImageryProvider,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Builds every collaborator and the prefill pipeline.
///
/// Must run inside the tokio runtime: the rate-limit queues spawn their
/// workers here, one for Overpass and one for Nominatim.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let (store, audit): (Arc<dyn CacheStore>, Option<Arc<dyn AuditSink>>) =
        match &config.database_url {
            Some(url) => {
                let db = Database::new(url).await?;
                db.ensure_schema().await?;
                tracing::info!("Database connection pool established");

                let audit = if config.audit_enabled {
                    Some(Arc::new(PgAuditSink::new(db.pool.clone())) as Arc<dyn AuditSink>)
                } else {
                    tracing::info!("Audit disabled by AUDIT_ENABLED");
                    None
                };
                (
                    Arc::new(PgCacheStore::new(db.pool.clone())) as Arc<dyn CacheStore>,
                    audit,
                )
            }
            None => (Arc::new(InMemoryCacheStore::new()) as Arc<dyn CacheStore>, None),
        };

    let registry: Arc<dyn CompanyRegistry> = match &config.registry {
        RegistrySource::Mock => Arc::new(MockRegistry::new()?),
        RegistrySource::Cerved { base_url, api_key } => {
            Arc::new(CervedRegistry::new(base_url.clone(), api_key.clone())?)
        }
    };

    let google = match &config.google_maps_api_key {
        Some(key) => Some(Arc::new(GoogleMapsClient::new(
            config.google_maps_base_url.clone(),
            key.clone(),
        )?)),
        None => None,
    };

    let provider: Arc<dyn Geocoder> = match &google {
        Some(client) => {
            tracing::info!("✓ Geocoding via Google");
            client.clone() as Arc<dyn Geocoder>
        }
        None => {
            tracing::info!("✓ Geocoding via Nominatim: {}", config.nominatim_base);
            Arc::new(NominatimGeocoder::new(
                config.nominatim_base.clone(),
                RateLimitQueue::per_second("nominatim"),
            )?)
        }
    };
    let geocoder: Arc<dyn Geocoder> = Arc::new(CachedGeocoder::new(provider, store.clone()));

    let overpass: Arc<dyn MapDataSource> =
        Arc::new(OverpassClient::new(config.overpass_endpoint.clone())?);
    let gateway = MapDataGateway::new(
        store,
        RateLimitQueue::per_second("overpass"),
        Arc::new(SystemClock),
        config.map_data_ttl(),
    );
    let buildings: Arc<dyn BuildingSource> = Arc::new(OsmBuildingSource::new(gateway, overpass));

    let elevation = google.clone().map(|g| g as Arc<dyn ElevationProvider>);
    let imagery = google.map(|g| g as Arc<dyn StreetImageryProvider>);

    let mut pipeline = PrefillPipeline::new(registry, geocoder.clone(), buildings.clone());
    if let Some(provider) = &elevation {
        pipeline = pipeline.with_elevation(provider.clone());
    }
    if let Some(provider) = &imagery {
        pipeline = pipeline.with_imagery(provider.clone());
    }
    if let Some(sink) = audit {
        pipeline = pipeline.with_audit(sink);
    }

    Ok(AppState {
        pipeline,
        geocoder,
        buildings,
        elevation,
        imagery,
    })
}

/// The `/api/v1` routes, without rate limiting or body limits.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/prefill", post(handlers::prefill))
        .route("/api/v1/geocoding", get(handlers::geocoding))
        .route("/api/v1/osm", get(handlers::osm))
        .route("/api/v1/google", get(handlers::google))
}
