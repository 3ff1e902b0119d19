//! Score mismatch arbitration
//!
//! Decision order: immaterial gap, clear reliability winner, moderate gap
//! (blend), large gap (revalidate).

use super::{weighted_value, ArbitrationPolicy};
use crate::prioritizer::SourcePriority;
use crate::types::{Conflict, ConflictType, Resolution, ResolutionType};
use serde_json::json;
use xval_common::config::ArbitrationThresholds;

pub struct ScoreMismatchPolicy;

impl ArbitrationPolicy for ScoreMismatchPolicy {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::ScoreMismatch
    }

    fn resolve(
        &self,
        conflict: &Conflict,
        priority: &SourcePriority,
        thresholds: &ArbitrationThresholds,
    ) -> Option<Resolution> {
        let scores = conflict.numbers("score");
        if scores.len() < 2 {
            return None;
        }
        let high = scores.iter().map(|(_, s)| *s).fold(f64::MIN, f64::max);
        let low = scores.iter().map(|(_, s)| *s).fold(f64::MAX, f64::min);
        let gap = high - low;

        if gap < thresholds.score_materiality_gap {
            return Some(Resolution::new(
                conflict.id,
                ResolutionType::Ignored,
                0.4,
                format!(
                    "{:.0} point gap on {} is below the {:.0} point materiality threshold",
                    gap, conflict.data_kind, thresholds.score_materiality_gap
                ),
            ));
        }

        if let Some(source) = priority.preferred_source() {
            let score = conflict.number_from(source, "score");
            let mut resolution = Resolution::new(
                conflict.id,
                ResolutionType::Confirmed,
                0.85,
                format!(
                    "{} is clearly the more reliable scorer for {}; keeping its score",
                    source, conflict.data_kind
                ),
            )
            .with_source(source);
            if let Some(score) = score {
                resolution = resolution.with_patch("score", json!(score));
            }
            return Some(resolution);
        }

        if gap < thresholds.score_revalidation_gap {
            let blended = weighted_value(&scores, priority)?;
            return Some(
                Resolution::new(
                    conflict.id,
                    ResolutionType::Hybrid,
                    0.75,
                    format!(
                        "No clearly better scorer for {}; using the reliability-weighted score {:.1}",
                        conflict.data_kind, blended
                    ),
                )
                .with_patch("score", json!(blended)),
            );
        }

        Some(
            Resolution::new(
                conflict.id,
                ResolutionType::NeedsRevalidation,
                0.5,
                format!(
                    "{:.0} point gap on {} with no clearly better scorer",
                    gap, conflict.data_kind
                ),
            )
            .with_action(format!(
                "Re-run the {} assessment with fresh inputs",
                conflict.data_kind
            )),
        )
    }
}
