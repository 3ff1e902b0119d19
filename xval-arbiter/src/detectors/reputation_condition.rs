//! Listing rating vs. visually assessed condition
//!
//! - High rating + poor condition: the rated listing is probably not the
//!   inspected premises (CRITICAL). With fewer than `min_review_count` reviews
//!   the rating is thin evidence and the conflict drops to LOW.
//! - Low rating + good condition: a service problem distinct from physical
//!   state (MEDIUM); both facts hold.

use super::{require, DetectionContext, DetectionRule, InputGap};
use crate::types::{source_label, Conflict, ConflictType, DataKind, FacetSnapshot, Severity, SourceValue};
use serde_json::json;

pub struct ReputationConditionRule;

impl DetectionRule for ReputationConditionRule {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::ReputationConditionMismatch
    }

    fn detect(
        &self,
        facets: &FacetSnapshot,
        ctx: &DetectionContext,
    ) -> Result<Vec<Conflict>, InputGap> {
        let listing = require(
            facets.first_listing(|l| l.rating.is_some_and(|r| r.is_finite())),
            "listing with rating",
        )?;
        let rating = require(listing.rating, "rating")?;
        let condition = require(facets.condition.as_ref(), "condition facet")?;
        let condition_score = require(
            condition.condition_score.filter(|s| s.is_finite()),
            "condition.condition_score",
        )?;
        if !(0.0..=5.0).contains(&rating) {
            return Err(InputGap::new(format!("rating {} outside 0-5", rating)));
        }
        if !(0.0..=10.0).contains(&condition_score) {
            return Err(InputGap::new(format!(
                "condition_score {} outside 0-10",
                condition_score
            )));
        }
        let t = &ctx.thresholds;

        let listing_source = source_label(&listing.source, "listing");
        let condition_source = source_label(&condition.source, "condition");
        let mut sources = vec![
            SourceValue::new(listing_source, "rating", json!(rating)),
            SourceValue::new(condition_source, "condition_score", json!(condition_score)),
        ];
        if let Some(count) = listing.review_count {
            sources.push(SourceValue::new(listing_source, "review_count", json!(count)));
        }

        let (severity, description) =
            if rating >= t.high_rating_floor && condition_score <= t.poor_condition_ceiling {
                match listing.review_count {
                    Some(count) if count < t.min_review_count => (
                        Severity::Low,
                        format!(
                            "{} rates {:.1}/5 on only {} reviews while {} scores condition {:.1}/10",
                            listing_source, rating, count, condition_source, condition_score
                        ),
                    ),
                    _ => (
                        Severity::Critical,
                        format!(
                            "{} rates {:.1}/5 but {} scores condition {:.1}/10; \
                             the rated listing is probably not the inspected premises",
                            listing_source, rating, condition_source, condition_score
                        ),
                    ),
                }
            } else if rating <= t.low_rating_ceiling && condition_score >= t.good_condition_floor {
                (
                    Severity::Medium,
                    format!(
                        "{} rates {:.1}/5 although {} scores condition {:.1}/10; \
                         points to a service-quality problem rather than physical state",
                        listing_source, rating, condition_source, condition_score
                    ),
                )
            } else {
                return Ok(Vec::new());
            };

        Ok(vec![ctx.conflict(
            ConflictType::ReputationConditionMismatch,
            severity,
            DataKind::VisualCondition,
            sources,
            description,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::tests::test_context;
    use crate::types::{ConditionSnapshot, ReputationSnapshot};

    fn facets(rating: f64, reviews: Option<u64>, condition: f64) -> FacetSnapshot {
        FacetSnapshot {
            reputation: vec![ReputationSnapshot {
                source: "Google Places".to_string(),
                rating: Some(rating),
                review_count: reviews,
                ..Default::default()
            }],
            condition: Some(ConditionSnapshot {
                source: "Vision".to_string(),
                condition_score: Some(condition),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_high_rating_poor_condition_is_critical() {
        let conflicts = ReputationConditionRule
            .detect(&facets(4.6, Some(230), 3.0), &test_context())
            .unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_unknown_review_count_still_critical() {
        let conflicts = ReputationConditionRule
            .detect(&facets(4.5, None, 2.0), &test_context())
            .unwrap();
        assert_eq!(conflicts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_thin_reviews_downgrade_to_low() {
        let conflicts = ReputationConditionRule
            .detect(&facets(4.8, Some(4), 3.0), &test_context())
            .unwrap();
        assert_eq!(conflicts[0].severity, Severity::Low);
    }

    #[test]
    fn test_low_rating_good_condition_is_medium() {
        let conflicts = ReputationConditionRule
            .detect(&facets(2.1, Some(80), 8.5), &test_context())
            .unwrap();
        assert_eq!(conflicts[0].severity, Severity::Medium);
    }

    #[test]
    fn test_aligned_values_no_conflict() {
        assert!(ReputationConditionRule
            .detect(&facets(4.5, Some(100), 8.0), &test_context())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_out_of_range_is_gap() {
        assert!(ReputationConditionRule
            .detect(&facets(7.0, Some(100), 8.0), &test_context())
            .is_err());
        assert!(ReputationConditionRule
            .detect(&facets(4.0, Some(100), 12.0), &test_context())
            .is_err());
    }
}
