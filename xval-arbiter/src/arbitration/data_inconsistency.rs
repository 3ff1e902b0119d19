//! Data inconsistency arbitration
//!
//! - Clear reliability winner: keep its value.
//! - Equally reliable sources: the value backed by more engagement (reviews,
//!   samples) wins when the counts differ.
//! - Otherwise blend moderate disagreements by reliability, and send large
//!   ones back upstream.

use super::{weighted_value, ArbitrationPolicy};
use crate::prioritizer::{Recommendation, SourcePriority};
use crate::types::{Conflict, ConflictType, Resolution, ResolutionType, Severity};
use serde_json::json;
use xval_common::config::ArbitrationThresholds;

pub struct DataInconsistencyPolicy;

impl ArbitrationPolicy for DataInconsistencyPolicy {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::DataInconsistency
    }

    fn resolve(
        &self,
        conflict: &Conflict,
        priority: &SourcePriority,
        _thresholds: &ArbitrationThresholds,
    ) -> Option<Resolution> {
        let values = conflict.numbers("value");
        if values.len() < 2 {
            return None;
        }
        let kind = conflict.data_kind;

        if let Some(source) = priority.preferred_source() {
            let mut resolution = Resolution::new(
                conflict.id,
                ResolutionType::Confirmed,
                0.9,
                format!("{} is the authoritative source for {}", source, kind),
            )
            .with_source(source);
            if let Some(value) = conflict.number_from(source, "value") {
                resolution = resolution.with_patch(kind.as_str(), json!(value));
            }
            return Some(resolution);
        }

        if let Some((source, engagement, value)) = engagement_winner(conflict, priority) {
            return Some(
                Resolution::new(
                    conflict.id,
                    ResolutionType::Confirmed,
                    0.85,
                    format!(
                        "Sources equally reliable for {}; {} is backed by more engagement ({:.0})",
                        kind, source, engagement
                    ),
                )
                .with_source(source)
                .with_patch(kind.as_str(), json!(value)),
            );
        }

        match conflict.severity {
            Severity::Low | Severity::Medium => {
                let blended = weighted_value(&values, priority)?;
                Some(
                    Resolution::new(
                        conflict.id,
                        ResolutionType::Hybrid,
                        0.75,
                        format!(
                            "No authoritative source for {}; using the reliability-weighted value {:.2}",
                            kind, blended
                        ),
                    )
                    .with_patch(kind.as_str(), json!(blended)),
                )
            }
            Severity::High | Severity::Critical => {
                let sources = conflict.source_names().join(" and ");
                Some(
                    Resolution::new(
                        conflict.id,
                        ResolutionType::NeedsRevalidation,
                        0.55,
                        format!("{} disagree too much on {} to pick or blend", sources, kind),
                    )
                    .with_action(format!("Re-fetch {} from {}", kind, sources)),
                )
            }
        }
    }
}

/// Higher-engagement source when the prioritizer rates the top two as
/// equally reliable (within `hybrid_gap`)
fn engagement_winner<'a>(
    conflict: &'a Conflict,
    priority: &SourcePriority,
) -> Option<(&'a str, f64, f64)> {
    if priority.recommendation != Recommendation::Hybrid {
        return None;
    }
    let first = priority.ranked.first()?;
    let second = priority.ranked.get(1)?;

    let samples = conflict.numbers("sample_size");
    let (a, b) = (
        samples.iter().find(|(s, _)| *s == first.source)?,
        samples.iter().find(|(s, _)| *s == second.source)?,
    );
    if a.1 == b.1 {
        return None;
    }
    let (source, engagement) = if a.1 > b.1 { *a } else { *b };
    let value = conflict.number_from(source, "value")?;
    Some((source, engagement, value))
}
