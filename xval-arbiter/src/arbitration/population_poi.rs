//! Population vs. POI arbitration
//!
//! HIGH (populated, no POI) points at bad coordinates: the data cannot be
//! trusted until the location is re-checked. LOW (sparse, many POIs) is a
//! commercial district where both facts hold.

use super::ArbitrationPolicy;
use crate::prioritizer::SourcePriority;
use crate::types::{Conflict, ConflictType, Resolution, ResolutionType, Severity};
use xval_common::config::ArbitrationThresholds;

pub struct PopulationPoiPolicy;

impl ArbitrationPolicy for PopulationPoiPolicy {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::PopulationPoiMismatch
    }

    fn resolve(
        &self,
        conflict: &Conflict,
        _priority: &SourcePriority,
        _thresholds: &ArbitrationThresholds,
    ) -> Option<Resolution> {
        let population = conflict.number("population")?;
        let poi_count = conflict.number("poi_count")?;

        match conflict.severity {
            Severity::High | Severity::Critical => {
                let radius = conflict
                    .number("search_radius_m")
                    .map(|r| format!(" (searched {:.0} m)", r))
                    .unwrap_or_default();
                Some(
                    Resolution::new(
                        conflict.id,
                        ResolutionType::NeedsRevalidation,
                        0.7,
                        format!(
                            "{:.0} inhabitants with {:.0} points of interest nearby{} is implausible; \
                             the geocoded position most likely misses the entity",
                            population, poi_count, radius
                        ),
                    )
                    .with_action(
                        "Re-check the coordinates of the entity, then re-run the POI search with a wider radius",
                    ),
                )
            }
            Severity::Low | Severity::Medium => Some(
                Resolution::new(
                    conflict.id,
                    ResolutionType::Hybrid,
                    0.85,
                    format!(
                        "Both sources hold: {:.0} residents and {:.0} points of interest describe a \
                         commercial district drawing outside footfall",
                        population, poi_count
                    ),
                )
                .with_patch("zone_profile", "commercial_district"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::tests::{make_conflict, resolve_with};
    use crate::types::{DataKind, SourceValue};
    use serde_json::json;

    fn conflict(severity: Severity, population: u64, poi: u32) -> Conflict {
        make_conflict(
            ConflictType::PopulationPoiMismatch,
            severity,
            DataKind::PoiDensity,
            vec![
                SourceValue::new("INSEE", "population", json!(population)),
                SourceValue::new("Google Places", "poi_count", json!(poi)),
            ],
        )
    }

    #[test]
    fn test_high_needs_revalidation() {
        let r = resolve_with(&conflict(Severity::High, 5000, 0));
        assert_eq!(r.resolution_type, ResolutionType::NeedsRevalidation);
        assert_eq!(r.confidence, 0.7);
        let action = r.action_required.unwrap();
        assert!(action.contains("coordinates"));
        assert!(action.contains("wider radius"));
    }

    #[test]
    fn test_low_is_commercial_district() {
        let r = resolve_with(&conflict(Severity::Low, 200, 45));
        assert_eq!(r.resolution_type, ResolutionType::Hybrid);
        assert_eq!(r.confidence, 0.85);
        assert_eq!(r.updated_data["zone_profile"], "commercial_district");
    }
}
