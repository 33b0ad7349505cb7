//! Prefill pipeline: tax identifier in, enriched insurance record out.
//!
//! Company lookup and geocoding are fatal when they fail or find nothing.
//! Elevation, footprint and water proximity run concurrently once the
//! coordinates are known; any of them being unavailable only degrades the
//! fields that depend on it.

use crate::audit;
use crate::confidence::{Confidence, SourceInfo};
use crate::coverage::{estimate_coverage, CoverageInput};
use crate::errors::{AppError, ResultExt, UpstreamExt};
use crate::inference::{infer_building, SiteSignals};
use crate::models::{
    BuildingAttributes, CompanyData, CoverageSuggestion, EnrichmentResult, RiskAssessment,
};
use crate::risk;
use crate::sources::{
    AuditSink, BuildingSource, CompanyRegistry, ElevationProvider, Geocoder,
    StreetImageryProvider,
};
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

const NOTE_FOOTPRINT_UNAVAILABLE: &str = "Building data source unavailable";
const NOTE_NO_BUILDING: &str = "No building mapped at this location";

// Italian P.IVA: exactly 11 digits
static PIVA_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[0-9]{11}$"));

/// Trims a raw tax identifier and checks it has the P.IVA shape.
pub fn normalize_piva(raw: &str) -> Result<String, AppError> {
    let piva = raw.trim();
    if piva.is_empty() {
        return Err(AppError::BadRequest("P.IVA is required".to_string()));
    }
    let piva_regex = PIVA_PATTERN
        .as_ref()
        .map_err(|e| AppError::InternalError(format!("Invalid P.IVA pattern: {}", e)))?;
    if !piva_regex.is_match(piva) {
        return Err(AppError::BadRequest(format!(
            "P.IVA must be 11 digits, got '{}'",
            piva
        )));
    }
    Ok(piva.to_string())
}

/// Sequences the collaborators for one prefill request.
///
/// Optional collaborators are checked once per request; an absent one is
/// not an error.
#[derive(Clone)]
pub struct PrefillPipeline {
    registry: Arc<dyn CompanyRegistry>,
    geocoder: Arc<dyn Geocoder>,
    buildings: Arc<dyn BuildingSource>,
    elevation: Option<Arc<dyn ElevationProvider>>,
    imagery: Option<Arc<dyn StreetImageryProvider>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl PrefillPipeline {
    pub fn new(
        registry: Arc<dyn CompanyRegistry>,
        geocoder: Arc<dyn Geocoder>,
        buildings: Arc<dyn BuildingSource>,
    ) -> Self {
        Self {
            registry,
            geocoder,
            buildings,
            elevation: None,
            imagery: None,
            audit: None,
        }
    }

    pub fn with_elevation(mut self, provider: Arc<dyn ElevationProvider>) -> Self {
        self.elevation = Some(provider);
        self
    }

    pub fn with_imagery(mut self, provider: Arc<dyn StreetImageryProvider>) -> Self {
        self.imagery = Some(provider);
        self
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub async fn enrich(&self, raw_piva: &str) -> Result<EnrichmentResult, AppError> {
        let piva = normalize_piva(raw_piva)?;
        let correlation_id = Uuid::new_v4();
        tracing::info!("Prefill {} started (request {})", piva, correlation_id);

        let company = self
            .registry
            .lookup(&piva)
            .await
            .context("Company lookup failed")?
            .ok_or_else(|| AppError::NotFound(format!("P.IVA {} not found", piva)))?;
        tracing::info!("Company found: {} (ATECO {})", company.legal_name, company.ateco);

        let address = company.address.trim();
        let mut geo = self
            .geocoder
            .resolve(address)
            .await
            .context("Geocoding failed")?
            .ok_or_else(|| {
                AppError::NotFound(format!("Geocoding found no match for '{}'", address))
            })?;
        let (lat, lng) = (geo.lat, geo.lng);
        tracing::info!("Geocoded via {}: ({}, {})", geo.provider, lat, lng);

        let elevation = async {
            match &self.elevation {
                Some(provider) => provider
                    .elevation_at(lat, lng)
                    .await
                    .or_unavailable("Elevation")
                    .map(Option::flatten),
                None => Ok(None),
            }
        };
        let footprint = async {
            self.buildings
                .building_footprint(lat, lng)
                .await
                .or_unavailable("Building footprint")
        };
        let water = async {
            self.buildings
                .distance_to_water(lat, lng)
                .await
                .or_unavailable("Water proximity")
        };
        let (elevation, footprint, water) = tokio::join!(elevation, footprint, water);
        let elevation_m = elevation?;
        let footprint = footprint?;
        let distance_to_water_m = water?;

        geo.elevation_m = elevation_m;
        geo.street_view_url = self.imagery.as_ref().map(|p| p.image_url_at(lat, lng));

        let risk = risk::assess(elevation_m, distance_to_water_m);

        let footprint_note = match &footprint {
            None => Some(NOTE_FOOTPRINT_UNAVAILABLE),
            Some(None) => Some(NOTE_NO_BUILDING),
            Some(Some(_)) => None,
        };
        let building = infer_building(
            footprint.as_ref().and_then(Option::as_ref),
            footprint_note,
            SiteSignals {
                elevation_m,
                slope_deg: Some(risk.slope_deg),
                distance_to_water_m,
            },
        );

        let suggestion = suggest_coverage(&company, &building, &risk);
        tracing::info!(
            "Prefill {} done: building {}, risk {:?} ({}), coverage {} ({})",
            piva,
            building.confidence,
            risk.band,
            risk.confidence,
            suggestion.breakdown.total,
            suggestion.confidence
        );

        let result = EnrichmentResult {
            company,
            geo,
            building,
            risk,
            suggestion,
            correlation_id,
        };

        if let Some(sink) = &self.audit {
            let recorded =
                audit::record_all(sink.as_ref(), &piva, audit_entries(&result), correlation_id)
                    .await;
            tracing::debug!("Recorded {} audit entries for {}", recorded, correlation_id);
        }

        Ok(result)
    }
}

fn field_confidence(sources: &BTreeMap<String, SourceInfo>, field: &str) -> Confidence {
    sources
        .get(field)
        .map(|s| s.confidence)
        .unwrap_or(Confidence::Low)
}

/// Runs the coverage model and attaches its provenance.
fn suggest_coverage(
    company: &CompanyData,
    building: &BuildingAttributes,
    risk: &RiskAssessment,
) -> CoverageSuggestion {
    let estimate = estimate_coverage(&CoverageInput {
        ateco: company.ateco.clone(),
        area_m2: building.area_m2,
        floors: building.floors,
        employees: company.estimated_employees,
        material: building.material_category,
        flood_score: risk.flood_score,
        area_confidence: field_confidence(&building.sources, "area"),
        floors_confidence: field_confidence(&building.sources, "floors"),
    });

    let mut sources = BTreeMap::new();
    sources.insert(
        "calculation".to_string(),
        SourceInfo::new(
            "Parametric Model",
            format!("ATECO {}", company.ateco),
            estimate.confidence,
        )
        .with_note(format!(
            "Parametric rules for sector {}, material {}",
            estimate.sector,
            building.material_category.as_str()
        )),
    );

    CoverageSuggestion {
        breakdown: estimate.breakdown,
        confidence: estimate.confidence,
        sources,
    }
}

fn audit_entries(result: &EnrichmentResult) -> Vec<(String, serde_json::Value, SourceInfo)> {
    let mut entries = Vec::new();
    let company = &result.company;
    let building = &result.building;

    let mut push = |field: &str, value: serde_json::Value, source: Option<&SourceInfo>| {
        if let Some(source) = source {
            entries.push((field.to_string(), value, source.clone()));
        }
    };

    push("company.legal_name", json!(company.legal_name), company.sources.get("base"));
    push("company.ateco", json!(company.ateco), company.sources.get("base"));
    push(
        "company.estimated_revenue",
        json!(company.estimated_revenue),
        company.sources.get("revenue"),
    );
    push(
        "company.estimated_employees",
        json!(company.estimated_employees),
        company.sources.get("employees"),
    );
    push("building.floors", json!(building.floors), building.sources.get("floors"));
    push("building.area_m2", json!(building.area_m2), building.sources.get("area"));
    push(
        "building.has_basement",
        json!(building.has_basement),
        building.sources.get("basement"),
    );
    push(
        "building.material_category",
        json!(building.material_category),
        building.sources.get("material"),
    );

    push(
        "risk.flood_score",
        json!(result.risk.flood_score),
        result.risk.sources.get("flood_score"),
    );
    push(
        "suggestion.total",
        json!(result.suggestion.breakdown),
        result.suggestion.sources.get("calculation"),
    );

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_piva() {
        assert_eq!(normalize_piva("  12345678901 ").unwrap(), "12345678901");
        assert!(matches!(normalize_piva(""), Err(AppError::BadRequest(_))));
        assert!(matches!(normalize_piva("   "), Err(AppError::BadRequest(_))));
        assert!(matches!(normalize_piva("1234567890"), Err(AppError::BadRequest(_))));
        assert!(matches!(normalize_piva("IT12345678901"), Err(AppError::BadRequest(_))));
        assert!(matches!(normalize_piva("1234567890a"), Err(AppError::BadRequest(_))));
        assert!(matches!(normalize_piva("123456789012"), Err(AppError::BadRequest(_))));
    }
}
