//! Geocoder disagreement
//!
//! Straight-line (haversine) distance between independently geocoded positions
//! of the same entity; the furthest pair is reported. Only the first usable
//! position of each distinct geocoder is compared.
//! - ≤ `geo_agreement_m` (100 m): no conflict
//! - ≤ `geo_medium_m` (150 m): LOW, advisory
//! - ≤ `geo_critical_m` (200 m): MEDIUM, advisory
//! - beyond: CRITICAL, one geocoder matched a different real-world place

use super::{DetectionContext, DetectionRule, InputGap};
use crate::reliability::normalize_source;
use crate::types::{source_label, Conflict, ConflictType, DataKind, FacetSnapshot, Severity, SourceValue};
use serde_json::json;

/// Mean Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in meters between two (lat, lon) pairs in degrees
pub fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub struct GeographicRule;

impl DetectionRule for GeographicRule {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::GeographicMismatch
    }

    fn detect(
        &self,
        facets: &FacetSnapshot,
        ctx: &DetectionContext,
    ) -> Result<Vec<Conflict>, InputGap> {
        let mut positions: Vec<(&str, (f64, f64))> = Vec::new();
        for (source, coordinates) in facets
            .geocoding
            .iter()
            .filter_map(|p| p.coordinates().map(|c| (source_label(&p.source, "geocoder"), c)))
        {
            let key = normalize_source(source);
            if positions.iter().all(|(seen, _)| normalize_source(seen) != key) {
                positions.push((source, coordinates));
            }
        }

        if positions.len() < 2 {
            return Err(InputGap::new(format!(
                "{} geocoder(s) with a usable position, need 2",
                positions.len()
            )));
        }

        // Furthest pair; first pair wins ties
        let mut furthest: Option<(usize, usize, f64)> = None;
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let d = haversine_m(positions[i].1, positions[j].1);
                if furthest.map_or(true, |(_, _, best)| d > best) {
                    furthest = Some((i, j, d));
                }
            }
        }
        let Some((i, j, distance)) = furthest else {
            return Ok(Vec::new());
        };

        let t = &ctx.thresholds;
        let severity = if distance <= t.geo_agreement_m {
            return Ok(Vec::new());
        } else if distance <= t.geo_medium_m {
            Severity::Low
        } else if distance <= t.geo_critical_m {
            Severity::Medium
        } else {
            Severity::Critical
        };

        let (source_a, (lat_a, lon_a)) = positions[i];
        let (source_b, (lat_b, lon_b)) = positions[j];
        let sources = vec![
            SourceValue::new(source_a, "position", json!({ "lat": lat_a, "lon": lon_a })),
            SourceValue::new(source_b, "position", json!({ "lat": lat_b, "lon": lon_b })),
        ];

        let description = if severity == Severity::Critical {
            format!(
                "{} and {} place the entity {:.0} m apart; one of them matched a different place",
                source_a, source_b, distance
            )
        } else {
            format!(
                "{} and {} place the entity {:.0} m apart",
                source_a, source_b, distance
            )
        };

        Ok(vec![ctx.conflict(
            ConflictType::GeographicMismatch,
            severity,
            DataKind::Location,
            sources,
            description,
        )])
    }
}

/// Read a `position` value written by this rule back into (lat, lon)
pub fn position_of(value: &serde_json::Value) -> Option<(f64, f64)> {
    let lat = value.get("lat")?.as_f64()?;
    let lon = value.get("lon")?.as_f64()?;
    Some((lat, lon))
}
