use crate::enrichment::PrefillPipeline;
use crate::errors::AppError;
use crate::geometry::validate_coordinates;
use crate::models::{BuildingFootprint, EnrichmentResult, GeoLocation, PrefillRequest};
use crate::sources::{BuildingSource, ElevationProvider, Geocoder, StreetImageryProvider};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Full prefill pipeline.
    pub pipeline: PrefillPipeline,
    /// Cached geocoder (the same one the pipeline uses).
    pub geocoder: Arc<dyn Geocoder>,
    /// Cached, rate-limited building source.
    pub buildings: Arc<dyn BuildingSource>,
    /// Present only when Google is configured.
    pub elevation: Option<Arc<dyn ElevationProvider>>,
    /// Present only when Google is configured.
    pub imagery: Option<Arc<dyn StreetImageryProvider>>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodingParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoordinateParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

fn require_coordinates(lat: Option<f64>, lng: Option<f64>) -> Result<(f64, f64), AppError> {
    let (Some(lat), Some(lng)) = (lat, lng) else {
        return Err(AppError::BadRequest(
            "Query parameters \"lat\" and \"lng\" are required".to_string(),
        ));
    };
    validate_coordinates(lat, lng)?;
    Ok((lat, lng))
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-catnat-prefill",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/prefill
///
/// Enriches a P.IVA into a full prefill record.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - Request body with the `piva` to enrich.
///
/// # Returns
///
/// * `Result<Json<EnrichmentResult>, AppError>` - The prefill record, 404 when
///   the company or its address cannot be resolved, 400 on a malformed P.IVA.
pub async fn prefill(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PrefillRequest>,
) -> Result<Json<EnrichmentResult>, AppError> {
    let piva = payload
        .piva
        .ok_or_else(|| AppError::BadRequest("P.IVA is required".to_string()))?;

    tracing::info!("POST /prefill - piva: {}", piva.trim());
    let result = state.pipeline.enrich(&piva).await?;

    Ok(Json(result))
}

/// GET /api/v1/geocoding?q=<address>
///
/// Resolves an address through the cached geocoder.
pub async fn geocoding(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeocodingParams>,
) -> Result<Json<GeoLocation>, AppError> {
    let address = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Query parameter \"q\" is required".to_string()))?;

    tracing::info!("GET /geocoding - q: {}", address);

    state
        .geocoder
        .resolve(address)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No geocoding match for '{}'", address)))
}

/// GET /api/v1/osm?lat=&lng=
///
/// Building footprint around a point, through the map-data cache and queue.
pub async fn osm(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CoordinateParams>,
) -> Result<Json<BuildingFootprint>, AppError> {
    let (lat, lng) = require_coordinates(params.lat, params.lng)?;
    tracing::info!("GET /osm - ({}, {})", lat, lng);

    state
        .buildings
        .building_footprint(lat, lng)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound("No building found at the specified location".to_string())
        })
}

/// GET /api/v1/google?lat=&lng=&type=elevation|streetview
///
/// # Returns
///
/// * `503` when Google is not configured, `400` on a bad `type` or
///   coordinates, `404` when no elevation is known for the point.
pub async fn google(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GoogleParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (lat, lng) = require_coordinates(params.lat, params.lng)?;
    let kind = params.kind.as_deref().ok_or_else(|| {
        AppError::BadRequest("Query parameter \"type\" is required".to_string())
    })?;

    let not_enabled = || {
        AppError::ServiceUnavailable(
            "Google services not enabled. Set USE_GOOGLE=true and provide GOOGLE_MAPS_API_KEY."
                .to_string(),
        )
    };

    match kind {
        "elevation" => {
            let provider = state.elevation.as_ref().ok_or_else(not_enabled)?;
            let elevation = provider.elevation_at(lat, lng).await?.ok_or_else(|| {
                AppError::NotFound("Elevation data not available".to_string())
            })?;
            Ok(Json(json!({ "elevation_m": elevation })))
        }
        "streetview" => {
            let provider = state.imagery.as_ref().ok_or_else(not_enabled)?;
            Ok(Json(json!({ "img_url": provider.image_url_at(lat, lng) })))
        }
        other => Err(AppError::BadRequest(format!(
            "Invalid type '{}'. Use \"elevation\" or \"streetview\"",
            other
        ))),
    }
}
