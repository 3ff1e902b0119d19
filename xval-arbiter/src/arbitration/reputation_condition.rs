//! Reputation vs. condition arbitration

use super::ArbitrationPolicy;
use crate::prioritizer::SourcePriority;
use crate::types::{Conflict, ConflictType, Resolution, ResolutionType, Severity};
use xval_common::config::ArbitrationThresholds;

pub struct ReputationConditionPolicy;

impl ArbitrationPolicy for ReputationConditionPolicy {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::ReputationConditionMismatch
    }

    fn resolve(
        &self,
        conflict: &Conflict,
        _priority: &SourcePriority,
        _thresholds: &ArbitrationThresholds,
    ) -> Option<Resolution> {
        let rating = conflict.number("rating")?;
        let condition = conflict.number("condition_score")?;

        let resolution = match conflict.severity {
            Severity::Critical | Severity::High => Resolution::new(
                conflict.id,
                ResolutionType::NeedsRevalidation,
                0.65,
                format!(
                    "A {:.1}/5 rating cannot describe premises in {:.1}/10 condition; \
                     the listing was probably matched to the wrong business",
                    rating, condition
                ),
            )
            .with_action("Re-validate the listing match (name, address, photos) before using its rating"),
            Severity::Medium => Resolution::new(
                conflict.id,
                ResolutionType::Hybrid,
                0.85,
                format!(
                    "Premises in good condition ({:.1}/10) but rated {:.1}/5: \
                     the problem is service quality, not the building",
                    condition, rating
                ),
            )
            .with_patch("service_quality_issue", true),
            Severity::Low => Resolution::new(
                conflict.id,
                ResolutionType::Ignored,
                0.3,
                "Too few reviews for the rating to contradict the visual assessment",
            ),
        };

        Some(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::tests::{make_conflict, resolve_with};
    use crate::types::{DataKind, SourceValue};
    use serde_json::json;

    fn conflict(severity: Severity, rating: f64, condition: f64) -> Conflict {
        make_conflict(
            ConflictType::ReputationConditionMismatch,
            severity,
            DataKind::VisualCondition,
            vec![
                SourceValue::new("Google Places", "rating", json!(rating)),
                SourceValue::new("Vision", "condition_score", json!(condition)),
            ],
        )
    }

    #[test]
    fn test_critical_needs_listing_revalidation() {
        let r = resolve_with(&conflict(Severity::Critical, 4.6, 3.0));
        assert_eq!(r.resolution_type, ResolutionType::NeedsRevalidation);
        assert_eq!(r.confidence, 0.65);
        assert!(r.action_required.unwrap().contains("listing"));
    }

    #[test]
    fn test_medium_flags_service_quality() {
        let r = resolve_with(&conflict(Severity::Medium, 2.1, 8.5));
        assert_eq!(r.resolution_type, ResolutionType::Hybrid);
        assert_eq!(r.updated_data["service_quality_issue"], true);
    }

    #[test]
    fn test_low_is_ignored() {
        let r = resolve_with(&conflict(Severity::Low, 4.8, 3.0));
        assert_eq!(r.resolution_type, ResolutionType::Ignored);
        assert_eq!(r.confidence, 0.3);
    }
}
