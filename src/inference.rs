//! Building attribute inference.
//!
//! Each rule maps tags (plus optional site signals) to a value and a
//! confidence. Rules are tried in priority order and the first applicable one
//! wins; explicit tags beat category defaults.

use crate::confidence::{Confidence, SourceInfo};
use crate::models::{BuildingAttributes, BuildingFootprint, BuildingTags, MaterialCategory};
use std::collections::BTreeMap;

/// A value produced by an inference rule together with its confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inferred<T> {
    pub value: T,
    pub confidence: Confidence,
}

impl<T> Inferred<T> {
    fn new(value: T, confidence: Confidence) -> Self {
        Self { value, confidence }
    }
}

/// Building-type buckets shared by the floor and area defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeBucket {
    Industrial,
    Retail,
    Office,
    Residential,
    Unmapped,
}

impl TypeBucket {
    fn of(building_type: Option<&str>) -> Self {
        match building_type {
            Some("industrial") | Some("warehouse") => TypeBucket::Industrial,
            Some("retail") | Some("commercial") => TypeBucket::Retail,
            Some("office") => TypeBucket::Office,
            Some("residential") | Some("apartments") => TypeBucket::Residential,
            _ => TypeBucket::Unmapped,
        }
    }

    fn default_floors(self) -> u32 {
        match self {
            TypeBucket::Industrial => 1,
            TypeBucket::Retail => 2,
            TypeBucket::Residential => 3,
            TypeBucket::Office => 4,
            TypeBucket::Unmapped => 2,
        }
    }

    fn default_area_m2(self) -> f64 {
        match self {
            TypeBucket::Industrial => 1200.0,
            TypeBucket::Retail => 180.0,
            TypeBucket::Office => 350.0,
            TypeBucket::Residential => 120.0,
            TypeBucket::Unmapped => 250.0,
        }
    }
}

/// Floor count: a positive `building:levels` tag is HIGH, otherwise a
/// building-type default at LOW.
pub fn infer_floors(tags: &BuildingTags) -> Inferred<u32> {
    if let Some(levels) = tags.levels().filter(|l| *l > 0) {
        let floors = u32::try_from(levels).unwrap_or(u32::MAX);
        return Inferred::new(floors, Confidence::High);
    }

    let bucket = TypeBucket::of(tags.building_type().as_deref());
    Inferred::new(bucket.default_floors(), Confidence::Low)
}

/// Basement presence.
///
/// An underground-levels tag of 1 or more is a HIGH `true`, a tag of 0 a HIGH
/// `false`. Without a usable tag the answer is `false` at MEDIUM: a low-lying,
/// flat site near water points to basement-avoidant construction, and the
/// insufficient-data case shares the same default.
pub fn infer_basement(
    tags: &BuildingTags,
    elevation_m: Option<f64>,
    slope_deg: Option<f64>,
    distance_to_water_m: Option<f64>,
) -> Inferred<bool> {
    match tags.underground_levels() {
        Some(n) if n >= 1 => return Inferred::new(true, Confidence::High),
        Some(0) => return Inferred::new(false, Confidence::High),
        _ => {}
    }

    let low_elevation = elevation_m.is_some_and(|e| e < 15.0);
    let low_slope = slope_deg.is_some_and(|s| s < 2.0);
    let near_water = distance_to_water_m.is_some_and(|d| d < 300.0);

    if low_elevation && low_slope && near_water {
        tracing::debug!("Flood-prone site signature, assuming no basement");
        return Inferred::new(false, Confidence::Medium);
    }

    Inferred::new(false, Confidence::Medium)
}

/// Construction material bucket.
///
/// `building:material` is HIGH when recognised and MEDIUM when present but
/// unrecognised; roof hints and the building type are LOW fallbacks.
pub fn infer_material(tags: &BuildingTags) -> Inferred<MaterialCategory> {
    if let Some(material) = tags.material().map(str::to_lowercase) {
        let category = if contains_any(&material, &["metal", "steel"]) {
            Some(MaterialCategory::Metal)
        } else if contains_any(&material, &["brick", "concrete", "stone"]) {
            Some(MaterialCategory::Masonry)
        } else if contains_any(&material, &["wood", "timber"]) {
            Some(MaterialCategory::Wood)
        } else {
            None
        };

        return match category {
            Some(category) => Inferred::new(category, Confidence::High),
            None => Inferred::new(MaterialCategory::Mixed, Confidence::Medium),
        };
    }

    if let Some(roof) = tags.roof().map(str::to_lowercase) {
        let category = if contains_any(&roof, &["metal", "steel"]) {
            Some(MaterialCategory::Metal)
        } else if contains_any(&roof, &["tile", "concrete"]) {
            Some(MaterialCategory::Masonry)
        } else if roof.contains("wood") {
            Some(MaterialCategory::Wood)
        } else {
            None
        };

        if let Some(category) = category {
            return Inferred::new(category, Confidence::Low);
        }
    }

    if TypeBucket::of(tags.building_type().as_deref()) == TypeBucket::Industrial {
        return Inferred::new(MaterialCategory::Metal, Confidence::Low);
    }

    Inferred::new(MaterialCategory::Unknown, Confidence::Low)
}

/// Ground area: a positive computed polygon area is HIGH, otherwise a
/// building-type default at LOW.
pub fn estimate_area(area_m2: Option<f64>, building_type: Option<&str>) -> Inferred<f64> {
    if let Some(area) = area_m2.filter(|a| a.is_finite() && *a > 0.0) {
        return Inferred::new(area, Confidence::High);
    }

    let normalized = building_type.map(str::to_lowercase);
    let bucket = TypeBucket::of(normalized.as_deref());
    Inferred::new(bucket.default_area_m2(), Confidence::Low)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Site signals available to the basement heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteSignals {
    pub elevation_m: Option<f64>,
    pub slope_deg: Option<f64>,
    pub distance_to_water_m: Option<f64>,
}

/// Runs every attribute rule and assembles the result with per-field
/// provenance. `footprint_note` explains a missing footprint (source
/// unavailable or no building mapped) and is attached to the fallbacks.
pub fn infer_building(
    footprint: Option<&BuildingFootprint>,
    footprint_note: Option<&str>,
    signals: SiteSignals,
) -> BuildingAttributes {
    let empty = BuildingTags::default();
    let tags = footprint.map(|f| &f.tags).unwrap_or(&empty);
    let area_hint = footprint.and_then(|f| f.area_m2);

    let floors = infer_floors(tags);
    let area = estimate_area(area_hint, tags.building_type().as_deref());
    let basement = infer_basement(
        tags,
        signals.elevation_m,
        signals.slope_deg,
        signals.distance_to_water_m,
    );
    let material = infer_material(tags);

    let confidence = Confidence::combine([
        floors.confidence,
        area.confidence,
        basement.confidence,
        material.confidence,
    ]);

    let with_note = |info: SourceInfo, confidence: Confidence| match footprint_note {
        Some(note) if confidence < Confidence::High => info.with_note(note),
        _ => info,
    };

    let mut sources = BTreeMap::new();
    sources.insert(
        "floors".to_string(),
        with_note(
            SourceInfo::new(
                "OSM",
                if floors.confidence == Confidence::High {
                    "building:levels tag"
                } else {
                    "category estimate"
                },
                floors.confidence,
            ),
            floors.confidence,
        ),
    );
    sources.insert(
        "area".to_string(),
        with_note(
            SourceInfo::new(
                "OSM",
                if area.confidence == Confidence::High {
                    "polygon geometry"
                } else {
                    "category default"
                },
                area.confidence,
            ),
            area.confidence,
        ),
    );
    sources.insert(
        "basement".to_string(),
        with_note(
            SourceInfo::new(
                "OSM",
                if basement.confidence == Confidence::High {
                    "building:levels:underground tag"
                } else {
                    "heuristic"
                },
                basement.confidence,
            ),
            basement.confidence,
        ),
    );
    sources.insert(
        "material".to_string(),
        with_note(
            SourceInfo::new(
                "OSM",
                if tags.material().is_some() {
                    "building:material tag"
                } else {
                    "roof/type estimate"
                },
                material.confidence,
            ),
            material.confidence,
        ),
    );

    BuildingAttributes {
        area_m2: area.value,
        floors: floors.value,
        has_basement: basement.value,
        material_category: material.value,
        tags: tags.clone(),
        polygon: footprint.and_then(|f| f.polygon.clone()),
        confidence,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BuildingTags {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_floors_from_levels_tag() {
        let result = infer_floors(&tags(&[("building", "yes"), ("building:levels", "5")]));
        assert_eq!(result.value, 5);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_floors_ignores_non_positive_levels() {
        let result = infer_floors(&tags(&[("building", "office"), ("building:levels", "0")]));
        assert_eq!(result.value, 4);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_floors_category_defaults() {
        for (kind, expected) in [
            ("industrial", 1),
            ("warehouse", 1),
            ("retail", 2),
            ("commercial", 2),
            ("residential", 3),
            ("apartments", 3),
            ("office", 4),
            ("yes", 2),
        ] {
            let result = infer_floors(&tags(&[("building", kind)]));
            assert_eq!(result.value, expected, "building={}", kind);
            assert_eq!(result.confidence, Confidence::Low);
        }
        assert_eq!(infer_floors(&BuildingTags::new()).value, 2);
    }

    #[test]
    fn test_basement_from_tag() {
        let yes = infer_basement(&tags(&[("building:levels:underground", "2")]), None, None, None);
        assert_eq!(yes, Inferred::new(true, Confidence::High));

        let no = infer_basement(&tags(&[("building:levels:underground", "0")]), None, None, None);
        assert_eq!(no, Inferred::new(false, Confidence::High));
    }

    #[test]
    fn test_basement_heuristic_is_always_false_medium() {
        let flood_prone = infer_basement(&BuildingTags::new(), Some(5.0), Some(0.5), Some(100.0));
        let upland = infer_basement(&BuildingTags::new(), Some(100.0), Some(5.0), Some(500.0));
        let unknown = infer_basement(&BuildingTags::new(), None, None, None);

        for result in [flood_prone, upland, unknown] {
            assert_eq!(result, Inferred::new(false, Confidence::Medium));
        }
    }

    #[test]
    fn test_material_explicit_tag() {
        let metal = infer_material(&tags(&[("building:material", "Steel frame")]));
        assert_eq!(metal, Inferred::new(MaterialCategory::Metal, Confidence::High));

        let brick = infer_material(&tags(&[("building:material", "brick")]));
        assert_eq!(brick, Inferred::new(MaterialCategory::Masonry, Confidence::High));

        let wood = infer_material(&tags(&[("building:material", "timber_framing")]));
        assert_eq!(wood, Inferred::new(MaterialCategory::Wood, Confidence::High));

        let glass = infer_material(&tags(&[("building:material", "glass")]));
        assert_eq!(glass, Inferred::new(MaterialCategory::Mixed, Confidence::Medium));
    }

    #[test]
    fn test_material_roof_fallback() {
        let tile = infer_material(&tags(&[("roof:material", "roof_tiles")]));
        assert_eq!(tile, Inferred::new(MaterialCategory::Masonry, Confidence::Low));

        let shape_only = infer_material(&tags(&[("roof:shape", "gabled")]));
        assert_eq!(shape_only, Inferred::new(MaterialCategory::Unknown, Confidence::Low));
    }

    #[test]
    fn test_material_building_type_fallback() {
        let result = infer_material(&tags(&[("building", "industrial")]));
        assert_eq!(result, Inferred::new(MaterialCategory::Metal, Confidence::Low));
    }

    #[test]
    fn test_area_rules() {
        assert_eq!(estimate_area(Some(1500.0), None), Inferred::new(1500.0, Confidence::High));
        assert_eq!(
            estimate_area(None, Some("industrial")),
            Inferred::new(1200.0, Confidence::Low)
        );
        assert_eq!(estimate_area(Some(0.0), Some("Retail")).value, 180.0);
        assert_eq!(estimate_area(None, Some("office")).value, 350.0);
        assert_eq!(estimate_area(None, Some("apartments")).value, 120.0);
        assert_eq!(estimate_area(None, None).value, 250.0);
    }

    #[test]
    fn test_missing_footprint_is_low_with_notes() {
        let attrs = infer_building(None, Some("map-data source unavailable"), SiteSignals::default());

        assert_eq!(attrs.confidence, Confidence::Low);
        assert_eq!(attrs.floors, 2);
        assert_eq!(attrs.area_m2, 250.0);
        assert!(attrs.polygon.is_none());
        for field in ["floors", "area", "material"] {
            let info = &attrs.sources[field];
            assert_eq!(info.confidence, Confidence::Low);
            assert_eq!(info.notes.as_deref(), Some("map-data source unavailable"));
        }
    }

    #[test]
    fn test_fully_tagged_footprint_keeps_tag_methods() {
        let footprint = BuildingFootprint {
            tags: tags(&[
                ("building", "industrial"),
                ("building:levels", "2"),
                ("building:levels:underground", "1"),
                ("building:material", "concrete"),
            ]),
            area_m2: Some(900.0),
            ..Default::default()
        };

        let attrs = infer_building(Some(&footprint), None, SiteSignals::default());
        assert_eq!(attrs.confidence, Confidence::High);
        assert!(attrs.has_basement);
        assert_eq!(attrs.sources["floors"].method, "building:levels tag");
        assert_eq!(attrs.sources["area"].method, "polygon geometry");
        assert_eq!(attrs.sources["basement"].method, "building:levels:underground tag");
        assert_eq!(attrs.sources["material"].method, "building:material tag");
    }
}
