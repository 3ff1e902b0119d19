//! Agents scoring the same dimension far apart
//!
//! Scores (0-100) are grouped by dimension and the first score of each distinct
//! source is kept; within a dimension the gap between the highest and lowest
//! of those sets the severity.

use super::{DetectionContext, DetectionRule, InputGap};
use crate::reliability::normalize_source;
use crate::types::{source_label, Conflict, ConflictType, DataKind, FacetSnapshot, Severity, SourceValue};
use serde_json::json;
use std::collections::BTreeMap;

pub struct ScoreMismatchRule;

impl DetectionRule for ScoreMismatchRule {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::ScoreMismatch
    }

    fn detect(
        &self,
        facets: &FacetSnapshot,
        ctx: &DetectionContext,
    ) -> Result<Vec<Conflict>, InputGap> {
        let mut by_dimension: BTreeMap<DataKind, Vec<(&str, f64)>> = BTreeMap::new();
        for assessment in &facets.scores {
            let Some(score) = assessment
                .score
                .filter(|s| s.is_finite() && (0.0..=100.0).contains(s))
            else {
                continue;
            };
            let source = source_label(&assessment.source, "agent");
            let scores = by_dimension.entry(assessment.dimension).or_default();
            let key = normalize_source(source);
            if scores.iter().all(|(seen, _)| normalize_source(seen) != key) {
                scores.push((source, score));
            }
        }

        let comparable: Vec<(DataKind, Vec<(&str, f64)>)> = by_dimension
            .into_iter()
            .filter(|(_, scores)| scores.len() >= 2)
            .collect();
        if comparable.is_empty() {
            return Err(InputGap::new("no dimension scored by two distinct sources"));
        }

        let t = &ctx.thresholds;
        let mut conflicts = Vec::new();
        for (dimension, scores) in comparable {
            let (high_source, high) = extreme(&scores, |a, b| a > b);
            let (low_source, low) = extreme(&scores, |a, b| a < b);
            let gap = high - low;

            let severity = if gap >= t.score_gap_high {
                Severity::High
            } else if gap >= t.score_gap_medium {
                Severity::Medium
            } else if gap >= t.score_gap_low {
                Severity::Low
            } else {
                continue;
            };

            conflicts.push(ctx.conflict(
                ConflictType::ScoreMismatch,
                severity,
                dimension,
                vec![
                    SourceValue::new(high_source, "score", json!(high)),
                    SourceValue::new(low_source, "score", json!(low)),
                ],
                format!(
                    "{} scores {} at {:.0} while {} scores it {:.0} ({:.0} point gap)",
                    high_source, dimension, high, low_source, low, gap
                ),
            ));
        }

        Ok(conflicts)
    }
}

/// First entry that is strictly better than all earlier ones
fn extreme<'a>(scores: &[(&'a str, f64)], better: impl Fn(f64, f64) -> bool) -> (&'a str, f64) {
    let mut best = scores[0];
    for &candidate in &scores[1..] {
        if better(candidate.1, best.1) {
            best = candidate;
        }
    }
    best
}
