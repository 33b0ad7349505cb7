//! Collaborator capabilities consumed by the prefill pipeline.
//!
//! Each external source is a trait with one implementation per provider.
//! Implementations are picked once at startup from [`crate::config::Config`].
//! Every method reports an upstream that did not answer as
//! [`AppError::ExternalApiError`]; whether that is fatal is the caller's call.

use crate::confidence::SourceInfo;
use crate::errors::AppError;
use crate::models::{BuildingFootprint, CompanyData, GeoLocation};
use async_trait::async_trait;
use uuid::Uuid;

/// Company registry lookup by tax identifier.
#[async_trait]
pub trait CompanyRegistry: Send + Sync {
    /// `Ok(None)` when the registry has no such company.
    async fn lookup(&self, piva: &str) -> Result<Option<CompanyData>, AppError>;
}

/// Address to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the provider found no match.
    async fn resolve(&self, address: &str) -> Result<Option<GeoLocation>, AppError>;
}

/// Ground elevation at a point.
#[async_trait]
pub trait ElevationProvider: Send + Sync {
    async fn elevation_at(&self, lat: f64, lng: f64) -> Result<Option<f64>, AppError>;
}

/// Street-level imagery reference. Pure URL construction.
pub trait StreetImageryProvider: Send + Sync {
    fn image_url_at(&self, lat: f64, lng: f64) -> String;
}

/// Raw map-data query endpoint.
///
/// Only ever called through [`crate::map_data::MapDataGateway`], which owns
/// caching and rate limiting.
#[async_trait]
pub trait MapDataSource: Send + Sync {
    async fn query_features(&self, query: &str) -> Result<serde_json::Value, AppError>;
}

/// Building footprint and water proximity around a point.
#[async_trait]
pub trait BuildingSource: Send + Sync {
    /// The nearest tagged building, or `None` when nothing was mapped.
    async fn building_footprint(
        &self,
        lat: f64,
        lng: f64,
    ) -> Result<Option<BuildingFootprint>, AppError>;

    /// Meters to the nearest water feature, or the no-water sentinel.
    async fn distance_to_water(&self, lat: f64, lng: f64) -> Result<f64, AppError>;
}

/// Append-only provenance log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        piva: &str,
        field: &str,
        value: serde_json::Value,
        source: &SourceInfo,
        correlation_id: Uuid,
    ) -> Result<(), AppError>;
}
