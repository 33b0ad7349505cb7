//! Flood and slope risk proxy.
//!
//! There is no terrain model behind these numbers: slope comes from coarse
//! elevation buckets and the flood score is a weighted sum of inverse
//! distance, elevation and slope terms.

use crate::confidence::{Confidence, SourceInfo};
use crate::geometry::WATER_SEARCH_RADIUS_M;
use crate::models::{RiskAssessment, RiskBand};
use std::collections::BTreeMap;

const DISTANCE_WEIGHT: f64 = 0.5;
const ELEVATION_WEIGHT: f64 = 0.3;
const SLOPE_WEIGHT: f64 = 0.2;

/// Slope proxy in degrees from elevation alone.
///
/// Missing or negative elevation gets the conservative 0.5°.
pub fn estimate_slope(elevation_m: Option<f64>) -> f64 {
    match elevation_m {
        Some(e) if e.is_finite() && e >= 0.0 => {
            if e < 10.0 {
                0.5
            } else if e < 50.0 {
                2.0
            } else {
                5.0
            }
        }
        _ => 0.5,
    }
}

/// Flood score in [0, 1].
///
/// Each term is clamped to [0, 1] before weighting. The distance term only
/// applies within the water search radius, the elevation term only when the
/// elevation is known; the slope term is always present.
pub fn flood_score(distance_to_water_m: Option<f64>, elevation_m: Option<f64>, slope_deg: f64) -> f64 {
    let mut score = 0.0;

    if let Some(distance) = distance_to_water_m.filter(|d| d.is_finite()) {
        let contribution = if distance > WATER_SEARCH_RADIUS_M {
            0.0
        } else {
            1.0 / distance.max(1.0)
        };
        score += DISTANCE_WEIGHT * contribution.clamp(0.0, 1.0);
    }

    if let Some(elevation) = elevation_m.filter(|e| e.is_finite()) {
        score += ELEVATION_WEIGHT * (1.0 / elevation.max(1.0)).clamp(0.0, 1.0);
    }

    score += SLOPE_WEIGHT * (1.0 / slope_deg.max(0.5)).clamp(0.0, 1.0);

    score.clamp(0.0, 1.0)
}

pub fn band(score: f64) -> RiskBand {
    if score < 0.3 {
        RiskBand::Low
    } else if score < 0.6 {
        RiskBand::Medium
    } else {
        RiskBand::High
    }
}

fn band_note(band: RiskBand) -> &'static str {
    match band {
        RiskBand::Low => "LOW (building on higher ground or far from watercourses)",
        RiskBand::Medium => "MEDIUM (possible exposure during exceptional events)",
        RiskBand::High => "HIGH (flat area close to watercourses)",
    }
}

/// Provenance of the flood proxy: never better than MEDIUM, LOW with a note
/// naming each missing input.
fn flood_source(elevation_m: Option<f64>, distance_to_water_m: Option<f64>, note: &str) -> SourceInfo {
    let mut missing = Vec::new();
    if distance_to_water_m.is_none() {
        missing.push("Water-proximity source unavailable");
    }
    if elevation_m.is_none() {
        missing.push("Elevation not available");
    }

    let confidence = if missing.is_empty() {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    let info = SourceInfo::new("Risk Proxy", "elevation buckets and water proximity", confidence);

    if missing.is_empty() {
        info.with_note(note)
    } else {
        info.with_note(missing.join("; "))
    }
}

/// Computes slope, flood score and band for a site.
pub fn assess(elevation_m: Option<f64>, distance_to_water_m: Option<f64>) -> RiskAssessment {
    let slope_deg = estimate_slope(elevation_m);
    let flood_score = flood_score(distance_to_water_m, elevation_m, slope_deg);
    let band = band(flood_score);
    let notes = format!("Flood risk from proxy: {}", band_note(band));

    let source = flood_source(elevation_m, distance_to_water_m, &notes);
    let confidence = source.confidence;
    let mut sources = BTreeMap::new();
    sources.insert("flood_score".to_string(), source);

    RiskAssessment {
        flood_score,
        slope_deg,
        distance_to_water_m,
        band,
        notes,
        confidence,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slope_buckets() {
        assert_eq!(estimate_slope(None), 0.5);
        assert_eq!(estimate_slope(Some(-3.0)), 0.5);
        assert_eq!(estimate_slope(Some(0.0)), 0.5);
        assert_eq!(estimate_slope(Some(9.9)), 0.5);
        assert_eq!(estimate_slope(Some(10.0)), 2.0);
        assert_eq!(estimate_slope(Some(49.0)), 2.0);
        assert_eq!(estimate_slope(Some(50.0)), 5.0);
    }

    #[test]
    fn test_far_from_water_high_ground() {
        // elevation 200 m: 0.3/200 + 0.2/5
        let score = flood_score(Some(10_000.0), Some(200.0), 5.0);
        assert!((score - (0.3 / 200.0 + 0.2 / 5.0)).abs() < 1e-12);
        assert_eq!(band(score), RiskBand::Low);
    }

    #[test]
    fn test_on_the_riverbank() {
        // distance 0.5 -> clamped to 1, elevation 0.5 -> 1, slope 0.5 -> 1
        let score = flood_score(Some(0.5), Some(0.5), 0.5);
        assert!((score - 1.0).abs() < 1e-12);
        assert_eq!(band(score), RiskBand::High);
    }

    #[test]
    fn test_unknown_elevation_is_omitted() {
        let with_unknown = flood_score(None, None, 0.5);
        assert!((with_unknown - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_distance_beyond_radius_contributes_nothing() {
        let beyond = flood_score(Some(1000.1), Some(100.0), 5.0);
        let absent = flood_score(None, Some(100.0), 5.0);
        assert_eq!(beyond, absent);
    }

    #[test]
    fn test_assess_builds_note() {
        let risk = assess(Some(3.0), Some(2.0));
        assert_eq!(risk.slope_deg, 0.5);
        assert_eq!(risk.distance_to_water_m, Some(2.0));
        // 0.5*0.5 + 0.3/3 + 0.2 = 0.55
        assert!((risk.flood_score - 0.55).abs() < 1e-12);
        assert_eq!(risk.band, RiskBand::Medium);
        assert!(risk.notes.contains("MEDIUM"));
    }

    #[test]
    fn test_provenance_degrades_with_missing_inputs() {
        let full = assess(Some(20.0), Some(400.0));
        assert_eq!(full.confidence, Confidence::Medium);
        assert_eq!(full.sources["flood_score"].notes.as_deref(), Some(full.notes.as_str()));

        let no_water = assess(Some(20.0), None);
        assert_eq!(no_water.confidence, Confidence::Low);
        assert_eq!(
            no_water.sources["flood_score"].notes.as_deref(),
            Some("Water-proximity source unavailable")
        );

        let nothing = assess(None, None);
        assert_eq!(nothing.sources["flood_score"].confidence, Confidence::Low);
        assert_eq!(
            nothing.sources["flood_score"].notes.as_deref(),
            Some("Water-proximity source unavailable; Elevation not available")
        );
    }
}
