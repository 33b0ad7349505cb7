//! Parametric coverage estimate by ATECO sector.
//!
//! The first two digits of the classification code pick a sector model. Each
//! model is linear in area and headcount; an unmatched code falls back to flat
//! per-area rates at LOW confidence. A flood uplift of up to 25% is applied to
//! the sum.

use crate::confidence::Confidence;
use crate::models::{CoverageBreakdown, MaterialCategory};
use std::fmt;

// Manufacturing (ATECO 10-33)
const MFG_EQUIPMENT_PER_M2: f64 = 450.0;
const MFG_EQUIPMENT_PER_FLOOR: f64 = 20_000.0;
const MFG_INVENTORY_PER_EMPLOYEE: f64 = 7_500.0;
const MFG_SYSTEMS_PER_M2: f64 = 120.0;
const MFG_DEFAULT_EMPLOYEES: u32 = 10;

// Retail (ATECO 45-47)
const RETAIL_INVENTORY_PER_M2: f64 = 400.0;
const RETAIL_EQUIPMENT_PER_M2: f64 = 125.0;
const RETAIL_SYSTEMS_PER_M2: f64 = 125.0;

// Professional services / offices (ATECO 58-82)
const SERVICES_EQUIPMENT_PER_EMPLOYEE: f64 = 4_000.0;
const SERVICES_SYSTEMS_PER_M2: f64 = 150.0;
const SERVICES_DEFAULT_EMPLOYEES: u32 = 5;

// Warehousing and logistics (ATECO 52)
const LOGISTICS_EQUIPMENT_PER_M2: f64 = 300.0;
const LOGISTICS_INVENTORY_PER_EMPLOYEE: f64 = 8_000.0;
const LOGISTICS_SYSTEMS_PER_M2: f64 = 100.0;
const LOGISTICS_DEFAULT_EMPLOYEES: u32 = 15;

// Hospitality (ATECO 55-56)
const HOSPITALITY_FURNITURE_PER_M2: f64 = 350.0;
const HOSPITALITY_SYSTEMS_PER_M2: f64 = 200.0;
const HOSPITALITY_STOCK_PER_M2: f64 = 50.0;

// Unclassified
const DEFAULT_EQUIPMENT_PER_M2: f64 = 250.0;
const DEFAULT_SYSTEMS_PER_M2: f64 = 100.0;
const DEFAULT_INVENTORY_PER_M2: f64 = 50.0;

const MAX_FLOOD_UPLIFT: f64 = 0.25;

/// Sector model selected from the ATECO division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sector {
    Manufacturing,
    Retail,
    ProfessionalServices,
    Logistics,
    Hospitality,
    Unclassified,
}

impl Sector {
    /// Picks the sector from the first two digits of an ATECO code.
    pub fn from_ateco(ateco: &str) -> Sector {
        let division = ateco
            .trim()
            .get(..2)
            .filter(|d| d.chars().all(|c| c.is_ascii_digit()))
            .and_then(|d| d.parse::<u8>().ok());

        match division {
            Some(10..=33) => Sector::Manufacturing,
            Some(45..=47) => Sector::Retail,
            Some(52) => Sector::Logistics,
            Some(55..=56) => Sector::Hospitality,
            Some(58..=82) => Sector::ProfessionalServices,
            _ => Sector::Unclassified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Manufacturing => "manufacturing",
            Sector::Retail => "retail",
            Sector::ProfessionalServices => "professional services",
            Sector::Logistics => "logistics",
            Sector::Hospitality => "hospitality",
            Sector::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the coverage model.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageInput {
    pub ateco: String,
    pub area_m2: f64,
    pub floors: u32,
    pub employees: Option<u32>,
    /// Recorded with the estimate; no sector model weights it yet.
    pub material: MaterialCategory,
    pub flood_score: f64,
    pub area_confidence: Confidence,
    pub floors_confidence: Confidence,
}

/// Output of [`estimate_coverage`].
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageEstimate {
    pub sector: Sector,
    pub breakdown: CoverageBreakdown,
    pub confidence: Confidence,
}

/// Applies the sector model and the flood uplift.
///
/// Pure: identical inputs always give identical output. Missing headcount
/// falls back to a sector-typical figure without lowering confidence.
/// Retail, services, logistics and hospitality never exceed MEDIUM.
pub fn estimate_coverage(input: &CoverageInput) -> CoverageEstimate {
    let sector = Sector::from_ateco(&input.ateco);
    let area = input.area_m2;
    let floors = f64::from(input.floors);
    let medium_ceiling = Confidence::combine([input.area_confidence, Confidence::Medium]);

    let (equipment, inventory, systems, confidence) = match sector {
        Sector::Manufacturing => {
            let employees = f64::from(input.employees.unwrap_or(MFG_DEFAULT_EMPLOYEES));
            (
                MFG_EQUIPMENT_PER_M2 * area + MFG_EQUIPMENT_PER_FLOOR * floors,
                MFG_INVENTORY_PER_EMPLOYEE * employees,
                MFG_SYSTEMS_PER_M2 * area,
                Confidence::combine([input.area_confidence, input.floors_confidence]),
            )
        }
        Sector::Retail => (
            RETAIL_EQUIPMENT_PER_M2 * area,
            RETAIL_INVENTORY_PER_M2 * area,
            RETAIL_SYSTEMS_PER_M2 * area,
            medium_ceiling,
        ),
        Sector::ProfessionalServices => {
            let employees = f64::from(input.employees.unwrap_or(SERVICES_DEFAULT_EMPLOYEES));
            (
                SERVICES_EQUIPMENT_PER_EMPLOYEE * employees,
                0.0,
                SERVICES_SYSTEMS_PER_M2 * area,
                medium_ceiling,
            )
        }
        Sector::Logistics => {
            let employees = f64::from(input.employees.unwrap_or(LOGISTICS_DEFAULT_EMPLOYEES));
            (
                LOGISTICS_EQUIPMENT_PER_M2 * area,
                LOGISTICS_INVENTORY_PER_EMPLOYEE * employees,
                LOGISTICS_SYSTEMS_PER_M2 * area,
                medium_ceiling,
            )
        }
        Sector::Hospitality => (
            HOSPITALITY_FURNITURE_PER_M2 * area,
            HOSPITALITY_STOCK_PER_M2 * area,
            HOSPITALITY_SYSTEMS_PER_M2 * area,
            medium_ceiling,
        ),
        Sector::Unclassified => (
            DEFAULT_EQUIPMENT_PER_M2 * area,
            DEFAULT_INVENTORY_PER_M2 * area,
            DEFAULT_SYSTEMS_PER_M2 * area,
            Confidence::Low,
        ),
    };

    let uplift = flood_uplift(input.flood_score);
    let total = ((equipment + inventory + systems) * uplift).round() as i64;

    CoverageEstimate {
        sector,
        breakdown: CoverageBreakdown {
            equipment: equipment.round() as i64,
            inventory: inventory.round() as i64,
            systems: systems.round() as i64,
            uplift: (uplift * 100.0).round() / 100.0,
            total,
        },
        confidence,
    }
}

/// `1 + 0.25 * flood_score`, in [1.0, 1.25] for scores in [0, 1].
pub fn flood_uplift(flood_score: f64) -> f64 {
    1.0 + MAX_FLOOD_UPLIFT * flood_score.clamp(0.0, 1.0)
}
