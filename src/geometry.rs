//! Footprint polygons, areas and point distances.
//!
//! Coordinates follow the GeoJSON convention: `x` is longitude, `y` is latitude.

use crate::errors::AppError;
use geo::{ChamberlainDuquetteArea, Coord, HaversineDistance, LineString, Point, Polygon};

/// Radius of the water-feature search around a building.
pub const WATER_SEARCH_RADIUS_M: f64 = 1000.0;

/// Returned by [`nearest_distance`] when no candidate exists: far enough away
/// that the distance term never contributes to the flood score.
pub const NO_WATER_SENTINEL_M: f64 = 10_000.0;

/// Builds a closed polygon from ordered `(lng, lat)` ring coordinates.
///
/// Non-finite pairs are dropped. Returns `None` when fewer than three usable
/// pairs remain. If the first and last pairs differ the first one is appended.
pub fn assemble_polygon(coordinates: &[(f64, f64)]) -> Option<Polygon<f64>> {
    let mut ring: Vec<Coord<f64>> = coordinates
        .iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|&(x, y)| Coord { x, y })
        .collect();

    if ring.len() < 3 {
        return None;
    }

    let first = ring[0];
    if ring.last() != Some(&first) {
        ring.push(first);
    }

    Some(Polygon::new(LineString::from(ring), vec![]))
}

/// Area of a polygon on the sphere, in square meters.
pub fn area_m2(polygon: &Polygon<f64>) -> f64 {
    polygon.chamberlain_duquette_unsigned_area()
}

/// Great-circle distance between two `(lng, lat)` points, in meters.
pub fn distance_meters(a: Point<f64>, b: Point<f64>) -> f64 {
    a.haversine_distance(&b)
}

/// Smallest distance from `origin` to any candidate, or
/// [`NO_WATER_SENTINEL_M`] when there are none.
pub fn nearest_distance(origin: Point<f64>, candidates: &[Point<f64>]) -> f64 {
    candidates
        .iter()
        .map(|candidate| distance_meters(origin, *candidate))
        .filter(|d| d.is_finite())
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))))
        .unwrap_or(NO_WATER_SENTINEL_M)
}

/// Rejects coordinates that cannot be a WGS84 position.
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), AppError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(AppError::BadRequest(
            "Coordinates must be finite numbers".to_string(),
        ));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::BadRequest(format!(
            "Coordinates out of range: lat={}, lng={}",
            lat, lng
        )));
    }
    Ok(())
}
