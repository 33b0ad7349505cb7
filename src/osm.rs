//! Building footprints and water proximity from OpenStreetMap data.

use crate::errors::AppError;
use crate::geometry::{self, WATER_SEARCH_RADIUS_M};
use crate::map_data::MapDataGateway;
use crate::models::{BuildingFootprint, BuildingTags};
use crate::overpass::{building_footprint_query, waterway_query, FOOTPRINT_RADIUS_M};
use crate::sources::{BuildingSource, MapDataSource};
use async_trait::async_trait;
use geo::Point;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    nodes: Vec<i64>,
    #[serde(default)]
    tags: BuildingTags,
    center: Option<Center>,
}

#[derive(Debug, Deserialize)]
struct Center {
    lat: f64,
    lon: f64,
}

fn parse_response(raw: &Value) -> Result<OverpassResponse, AppError> {
    OverpassResponse::deserialize(raw).map_err(|e| {
        AppError::ExternalApiError(format!("Unexpected Overpass response shape: {}", e))
    })
}

/// Extracts the first tagged building way and assembles its footprint.
///
/// Node references missing from the response are skipped. Fewer than three
/// resolved nodes leaves the polygon and area unset.
pub fn parse_building_footprint(raw: &Value) -> Result<Option<BuildingFootprint>, AppError> {
    let response = parse_response(raw)?;

    let Some(building) = response
        .elements
        .iter()
        .find(|el| el.kind == "way" && el.tags.get(BuildingTags::BUILDING).is_some())
    else {
        return Ok(None);
    };

    let nodes: HashMap<i64, (f64, f64)> = response
        .elements
        .iter()
        .filter(|el| el.kind == "node")
        .filter_map(|el| Some((el.id, (el.lon?, el.lat?))))
        .collect();

    let ring: Vec<(f64, f64)> = building
        .nodes
        .iter()
        .filter_map(|id| nodes.get(id).copied())
        .collect();

    let polygon = geometry::assemble_polygon(&ring);
    let area_m2 = polygon.as_ref().map(geometry::area_m2);
    let tags = building.tags.clone();

    Ok(Some(BuildingFootprint {
        polygon,
        area_m2,
        levels: tags.levels(),
        underground_levels: tags.underground_levels(),
        material: tags.material().map(str::to_string),
        roof: tags.roof().map(str::to_string),
        height_m: tags.height(),
        tags,
    }))
}

/// Candidate water positions: way and relation centers plus bare nodes.
pub fn parse_water_points(raw: &Value) -> Result<Vec<Point<f64>>, AppError> {
    let response = parse_response(raw)?;

    Ok(response
        .elements
        .iter()
        .filter_map(|el| match el.kind.as_str() {
            "way" | "relation" => el.center.as_ref().map(|c| Point::new(c.lon, c.lat)),
            "node" => Some(Point::new(el.lon?, el.lat?)),
            _ => None,
        })
        .collect())
}

/// [`BuildingSource`] over the cached, rate-limited map-data gateway.
#[derive(Clone)]
pub struct OsmBuildingSource {
    gateway: MapDataGateway,
    source: Arc<dyn MapDataSource>,
}

impl OsmBuildingSource {
    pub fn new(gateway: MapDataGateway, source: Arc<dyn MapDataSource>) -> Self {
        Self { gateway, source }
    }

    async fn query(&self, query: String) -> Result<Value, AppError> {
        let source = self.source.clone();
        let owned = query.clone();
        self.gateway
            .fetch_cached(&query, move || async move { source.query_features(&owned).await })
            .await
    }
}

#[async_trait]
impl BuildingSource for OsmBuildingSource {
    async fn building_footprint(
        &self,
        lat: f64,
        lng: f64,
    ) -> Result<Option<BuildingFootprint>, AppError> {
        let raw = self
            .query(building_footprint_query(lat, lng, FOOTPRINT_RADIUS_M))
            .await?;
        let footprint = parse_building_footprint(&raw)?;

        match &footprint {
            Some(f) => tracing::info!(
                "Building found near ({}, {}): area={:?} levels={:?}",
                lat,
                lng,
                f.area_m2,
                f.levels
            ),
            None => tracing::info!("No building mapped near ({}, {})", lat, lng),
        }
        Ok(footprint)
    }

    async fn distance_to_water(&self, lat: f64, lng: f64) -> Result<f64, AppError> {
        let raw = self
            .query(waterway_query(lat, lng, WATER_SEARCH_RADIUS_M as u32))
            .await?;
        let candidates = parse_water_points(&raw)?;
        let distance = geometry::nearest_distance(Point::new(lng, lat), &candidates);

        tracing::debug!(
            "{} water candidates near ({}, {}), nearest {:.0} m",
            candidates.len(),
            lat,
            lng,
            distance
        );
        Ok(distance)
    }
}
