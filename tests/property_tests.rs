/// Property-based tests using proptest
/// Tests invariants of the pure scoring, geometry and coverage rules
use proptest::prelude::*;
use rust_catnat_prefill::confidence::Confidence;
use rust_catnat_prefill::coverage::{estimate_coverage, flood_uplift, CoverageInput};
use rust_catnat_prefill::geometry::assemble_polygon;
use rust_catnat_prefill::models::MaterialCategory;
use rust_catnat_prefill::risk::{assess, estimate_slope, flood_score};

fn confidence() -> impl Strategy<Value = Confidence> {
    prop_oneof![
        Just(Confidence::Low),
        Just(Confidence::Medium),
        Just(Confidence::High)
    ]
}

fn ateco() -> impl Strategy<Value = String> {
    (0u8..100, 0u8..100, 0u8..100).prop_map(|(a, b, c)| format!("{:02}.{:02}.{:02}", a, b, c))
}

// Property: combining confidences is the minimum, whatever the order
proptest! {
    #[test]
    fn combine_is_the_minimum(values in prop::collection::vec(confidence(), 1..8)) {
        let combined = Confidence::combine(values.clone());
        prop_assert_eq!(Some(combined), values.iter().copied().min());
    }

    #[test]
    fn combine_is_commutative(a in confidence(), b in confidence()) {
        prop_assert_eq!(Confidence::combine([a, b]), Confidence::combine([b, a]));
    }

    #[test]
    fn combine_never_upgrades(a in confidence(), b in confidence()) {
        let combined = Confidence::combine([a, b]);
        prop_assert!(combined <= a && combined <= b);
    }
}

// Property: assembled polygons are always closed rings
proptest! {
    #[test]
    fn assembled_polygon_is_closed(
        ring in prop::collection::vec((-180.0f64..180.0, -90.0f64..90.0), 3..20)
    ) {
        let polygon = assemble_polygon(&ring).expect("three finite points make a ring");
        let coords: Vec<_> = polygon.exterior().coords().copied().collect();
        prop_assert!(coords.len() >= 4);
        prop_assert_eq!(coords.first(), coords.last());
    }

    #[test]
    fn short_rings_are_rejected(ring in prop::collection::vec((-180.0f64..180.0, -90.0f64..90.0), 0..3)) {
        prop_assert!(assemble_polygon(&ring).is_none());
    }
}

// Property: the flood proxy stays in range and never rewards proximity
proptest! {
    #[test]
    fn flood_score_is_bounded(
        distance in prop::option::of(0.0f64..20_000.0),
        elevation in prop::option::of(-50.0f64..4_000.0),
    ) {
        let risk = assess(elevation, distance);
        prop_assert!((0.0..=1.0).contains(&risk.flood_score));
    }

    #[test]
    fn flood_score_non_increasing_in_distance(
        near in 0.0f64..5_000.0,
        extra in 0.0f64..5_000.0,
        elevation in prop::option::of(0.0f64..500.0),
    ) {
        let slope = estimate_slope(elevation);
        let close = flood_score(Some(near), elevation, slope);
        let far = flood_score(Some(near + extra), elevation, slope);
        prop_assert!(far <= close + 1e-12);
    }

    #[test]
    fn flood_score_non_increasing_in_elevation(
        distance in prop::option::of(0.0f64..2_000.0),
        low in 0.0f64..500.0,
        extra in 0.0f64..500.0,
        slope in 0.5f64..10.0,
    ) {
        let valley = flood_score(distance, Some(low), slope);
        let hill = flood_score(distance, Some(low + extra), slope);
        prop_assert!(hill <= valley + 1e-12);
    }
}

// Property: the coverage model is pure and the flood uplift only adds
proptest! {
    #[test]
    fn coverage_is_deterministic_and_uplifted(
        ateco in ateco(),
        area in 10.0f64..20_000.0,
        floors in 1u32..10,
        employees in prop::option::of(1u32..500),
        low_score in 0.0f64..1.0,
        extra in 0.0f64..1.0,
        area_confidence in confidence(),
        floors_confidence in confidence(),
    ) {
        let base = CoverageInput {
            ateco,
            area_m2: area,
            floors,
            employees,
            material: MaterialCategory::Unknown,
            flood_score: low_score,
            area_confidence,
            floors_confidence,
        };
        let riskier = CoverageInput {
            flood_score: (low_score + extra).min(1.0),
            ..base.clone()
        };

        let first = estimate_coverage(&base);
        prop_assert_eq!(&first, &estimate_coverage(&base));

        let second = estimate_coverage(&riskier);
        prop_assert!(second.breakdown.total >= first.breakdown.total);
        // 0.01 of extra score adds 0.25% of a base of at least 800 euros
        if riskier.flood_score - base.flood_score >= 0.01 && first.breakdown.total >= 1000 {
            prop_assert!(second.breakdown.total > first.breakdown.total);
        }
        prop_assert!(first.breakdown.total >= first.breakdown.equipment
            + first.breakdown.inventory
            + first.breakdown.systems
            - 2);
        prop_assert!(first.confidence <= area_confidence);
    }

    #[test]
    fn uplift_stays_in_range(score in -1.0f64..2.0) {
        let uplift = flood_uplift(score);
        prop_assert!((1.0..=1.25).contains(&uplift));
    }
}
