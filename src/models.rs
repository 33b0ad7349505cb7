use crate::confidence::{Confidence, SourceInfo};
use chrono::{DateTime, Utc};
use geo::Polygon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============ Company Models ============

/// Company record returned by a company registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyData {
    /// Tax identifier (P.IVA).
    pub piva: String,
    /// Legal name (ragione sociale).
    pub legal_name: String,
    /// Full postal address used for geocoding.
    pub address: String,
    /// Postal code.
    pub cap: String,
    /// Municipality.
    pub municipality: String,
    /// ATECO classification code, e.g. "25.11.00".
    pub ateco: String,
    /// Estimated yearly revenue in euros.
    pub estimated_revenue: Option<f64>,
    /// Estimated headcount.
    pub estimated_employees: Option<u32>,
    /// Provenance keyed by field group ("base", "revenue", "employees").
    #[serde(default)]
    pub sources: BTreeMap<String, SourceInfo>,
}

// ============ Geo Models ============

/// Resolved location for a company address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Address as normalized by the geocoding provider.
    pub address_normalized: String,
    /// Geocoding provider name ("nominatim", "google").
    pub provider: String,
    /// Ground elevation in meters, when an elevation provider answered.
    pub elevation_m: Option<f64>,
    /// Street-level imagery URL. Built per request and never cached.
    pub street_view_url: Option<String>,
}

impl GeoLocation {
    pub fn new(lat: f64, lng: f64, address_normalized: impl Into<String>, provider: &str) -> Self {
        Self {
            lat,
            lng,
            address_normalized: address_normalized.into(),
            provider: provider.to_string(),
            elevation_m: None,
            street_view_url: None,
        }
    }
}

// ============ Building Models ============

/// Open tag mapping from the map-data source.
///
/// Unknown keys are carried but ignored; the accessors expose the keys the
/// inference rules understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingTags(pub BTreeMap<String, String>);

impl BuildingTags {
    pub const BUILDING: &'static str = "building";
    pub const LEVELS: &'static str = "building:levels";
    pub const UNDERGROUND_LEVELS: &'static str = "building:levels:underground";
    pub const MATERIAL: &'static str = "building:material";
    pub const ROOF_MATERIAL: &'static str = "roof:material";
    pub const ROOF_SHAPE: &'static str = "roof:shape";
    pub const HEIGHT: &'static str = "height";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Lowercased value of the `building` tag.
    pub fn building_type(&self) -> Option<String> {
        self.get(Self::BUILDING).map(str::to_lowercase)
    }

    pub fn levels(&self) -> Option<i64> {
        self.get(Self::LEVELS).and_then(parse_leading_int)
    }

    pub fn underground_levels(&self) -> Option<i64> {
        self.get(Self::UNDERGROUND_LEVELS).and_then(parse_leading_int)
    }

    pub fn material(&self) -> Option<&str> {
        self.get(Self::MATERIAL).filter(|m| !m.trim().is_empty())
    }

    /// `roof:material`, falling back to `roof:shape`.
    pub fn roof(&self) -> Option<&str> {
        self.get(Self::ROOF_MATERIAL)
            .or_else(|| self.get(Self::ROOF_SHAPE))
            .filter(|r| !r.trim().is_empty())
    }

    /// Height in meters; tolerates a trailing unit such as "12 m".
    pub fn height(&self) -> Option<f64> {
        let raw = self.get(Self::HEIGHT)?.trim();
        let numeric: String = raw
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        numeric.parse::<f64>().ok().filter(|h| h.is_finite())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildingTags {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parses the leading integer of a tag value ("5", " 3 ", "2;3", "4.5" -> 4).
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok().map(|n| sign * n)
}

/// Building footprint extracted from raw map-data elements around a point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildingFootprint {
    /// Closed ground-plan ring in (lng, lat) order.
    pub polygon: Option<Polygon<f64>>,
    /// Raw tags of the building way.
    pub tags: BuildingTags,
    /// Geodesic area of the polygon in square meters.
    pub area_m2: Option<f64>,
    /// Parsed `building:levels`.
    pub levels: Option<i64>,
    /// Parsed `building:levels:underground`.
    pub underground_levels: Option<i64>,
    /// Raw `building:material`.
    pub material: Option<String>,
    /// Raw `roof:material` or `roof:shape`.
    pub roof: Option<String>,
    /// Parsed `height` in meters.
    pub height_m: Option<f64>,
}

/// Construction material bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialCategory {
    Metal,
    Masonry,
    Wood,
    Mixed,
    Unknown,
}

impl MaterialCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialCategory::Metal => "METAL",
            MaterialCategory::Masonry => "MASONRY",
            MaterialCategory::Wood => "WOOD",
            MaterialCategory::Mixed => "MIXED",
            MaterialCategory::Unknown => "UNKNOWN",
        }
    }
}

/// Inferred building attributes with per-field provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingAttributes {
    /// Ground area in square meters.
    pub area_m2: f64,
    /// Number of above-ground floors.
    pub floors: u32,
    /// Whether the building is assumed to have a basement.
    pub has_basement: bool,
    /// Construction material bucket.
    pub material_category: MaterialCategory,
    /// Tags the inference ran on.
    pub tags: BuildingTags,
    /// Footprint polygon when one could be assembled.
    pub polygon: Option<Polygon<f64>>,
    /// Combined confidence of floors, area, basement and material.
    pub confidence: Confidence,
    /// Provenance keyed by field ("floors", "area", "basement", "material").
    pub sources: BTreeMap<String, SourceInfo>,
}

// ============ Risk Models ============

/// Coarse flood exposure band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

/// Flood and slope proxy for a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Unitless flood exposure proxy in [0, 1].
    pub flood_score: f64,
    /// Slope proxy in degrees, derived from elevation buckets.
    pub slope_deg: f64,
    /// Distance to the nearest mapped water feature, when the lookup answered.
    pub distance_to_water_m: Option<f64>,
    /// Band of the flood score.
    pub band: RiskBand,
    /// Human-readable explanation.
    pub notes: String,
    /// MEDIUM at best; LOW when elevation or water proximity was missing.
    pub confidence: Confidence,
    /// Provenance keyed by field ("flood_score").
    pub sources: BTreeMap<String, SourceInfo>,
}

// ============ Coverage Models ============

/// Recommended coverage split by asset class. Amounts are whole euros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageBreakdown {
    /// Equipment and furniture (beni strumentali).
    pub equipment: i64,
    /// Stock (scorte).
    pub inventory: i64,
    /// Systems and fixtures (impianti).
    pub systems: i64,
    /// Flood uplift multiplier, two decimals.
    pub uplift: f64,
    /// Total recommended coverage after uplift.
    pub total: i64,
}

/// Coverage recommendation with its confidence and provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageSuggestion {
    pub breakdown: CoverageBreakdown,
    pub confidence: Confidence,
    pub sources: BTreeMap<String, SourceInfo>,
}

// ============ Cache Models ============

/// A cached map-data response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content hash of the query text.
    pub key: String,
    /// The query text itself, kept for inspection.
    pub query: String,
    /// Raw JSON response body.
    pub payload: String,
    /// SHA-256 of `payload`, hex encoded.
    pub checksum: String,
    /// The entry is logically absent from this instant on.
    pub expires_at: DateTime<Utc>,
}

// ============ API Request/Response Models ============

/// Request payload for the prefill endpoint.
#[derive(Debug, Deserialize)]
pub struct PrefillRequest {
    /// Tax identifier; surrounding whitespace is trimmed.
    pub piva: Option<String>,
}

/// Complete prefill record for one tax identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub company: CompanyData,
    pub geo: GeoLocation,
    pub building: BuildingAttributes,
    pub risk: RiskAssessment,
    pub suggestion: CoverageSuggestion,
    /// Correlates this response with its audit records.
    pub correlation_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("5"), Some(5));
        assert_eq!(parse_leading_int(" 3 "), Some(3));
        assert_eq!(parse_leading_int("4.5"), Some(4));
        assert_eq!(parse_leading_int("2;3"), Some(2));
        assert_eq!(parse_leading_int("-1"), Some(-1));
        assert_eq!(parse_leading_int("many"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn test_tag_accessors() {
        let tags: BuildingTags = [
            ("building", "Industrial"),
            ("building:levels", "2"),
            ("roof:shape", "flat"),
            ("height", "12 m"),
            ("shop", "ignored"),
        ]
        .into_iter()
        .collect();

        assert_eq!(tags.building_type().as_deref(), Some("industrial"));
        assert_eq!(tags.levels(), Some(2));
        assert_eq!(tags.underground_levels(), None);
        assert_eq!(tags.roof(), Some("flat"));
        assert_eq!(tags.height(), Some(12.0));
        assert_eq!(tags.material(), None);
    }

    #[test]
    fn test_tags_serialize_as_plain_map() {
        let tags: BuildingTags = [("building", "office")].into_iter().collect();
        assert_eq!(
            serde_json::to_value(&tags).unwrap(),
            serde_json::json!({"building": "office"})
        );
    }
}
