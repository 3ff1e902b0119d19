//! Geographic arbitration
//!
//! Beyond the critical distance the geocoders describe two different places:
//! the least reliable one is rejected outright. Inside the advisory band the
//! outcome depends on how clearly one geocoder outranks the other.

use super::ArbitrationPolicy;
use crate::detectors::geographic::{haversine_m, position_of};
use crate::prioritizer::SourcePriority;
use crate::types::{Conflict, ConflictType, Resolution, ResolutionType, Severity};
use serde_json::json;
use xval_common::config::ArbitrationThresholds;

pub struct GeographicPolicy;

impl ArbitrationPolicy for GeographicPolicy {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::GeographicMismatch
    }

    fn resolve(
        &self,
        conflict: &Conflict,
        priority: &SourcePriority,
        _thresholds: &ArbitrationThresholds,
    ) -> Option<Resolution> {
        let positions: Vec<(&str, (f64, f64))> = conflict
            .sources
            .iter()
            .filter(|sv| sv.field == "position")
            .filter_map(|sv| position_of(&sv.value).map(|p| (sv.source.as_str(), p)))
            .collect();
        let [(_, a), (_, b)] = positions.get(..2)? else {
            return None;
        };
        let distance = haversine_m(*a, *b);

        let resolution = match conflict.severity {
            Severity::Critical | Severity::High => {
                let kept = priority.top()?;
                let rejected = priority.bottom()?;
                if kept.source == rejected.source {
                    return None;
                }
                Resolution::new(
                    conflict.id,
                    ResolutionType::Rejected,
                    0.95,
                    format!(
                        "Positions {:.0} m apart cannot be the same entity; keeping {} \
                         (reliability {:.0}) and rejecting {} (reliability {:.0})",
                        distance, kept.source, kept.reliability, rejected.source, rejected.reliability
                    ),
                )
                .with_source(kept.source.as_str())
                .with_patch("rejected_source", rejected.source.as_str())
                .with_action(format!(
                    "Re-run the {} search with strict matching",
                    rejected.source
                ))
            }
            Severity::Medium => match priority.preferred_source() {
                Some(source) => Resolution::new(
                    conflict.id,
                    ResolutionType::Confirmed,
                    0.85,
                    format!(
                        "{} is clearly the more reliable geocoder; {:.0} m offset attributed to the other",
                        source, distance
                    ),
                )
                .with_source(source),
                None => Resolution::new(
                    conflict.id,
                    ResolutionType::NeedsRevalidation,
                    0.6,
                    format!(
                        "{:.0} m offset between geocoders of comparable reliability",
                        distance
                    ),
                )
                .with_action("Re-run geocoding with a wider search radius"),
            },
            Severity::Low => match priority.favoured_source() {
                Some(source) => Resolution::new(
                    conflict.id,
                    ResolutionType::Confirmed,
                    0.85,
                    format!("{:.0} m offset; keeping the position from {}", distance, source),
                )
                .with_source(source),
                None => {
                    let midpoint = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
                    Resolution::new(
                        conflict.id,
                        ResolutionType::Hybrid,
                        0.8,
                        format!(
                            "{:.0} m offset between equally reliable geocoders; using the midpoint",
                            distance
                        ),
                    )
                    .with_patch("position", json!({ "lat": midpoint.0, "lon": midpoint.1 }))
                }
            },
        };

        Some(resolution)
    }
}
