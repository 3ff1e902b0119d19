//! Same numeric fact reported differently by two sources
//!
//! Facts are grouped by data kind (see `FacetSnapshot::observations_by_kind`).
//! Within a kind, the first observation of each distinct source is kept and
//! the ratio between the largest and smallest value sets the severity. A zero
//! against a positive value is treated as the largest possible ratio.

use super::{DetectionContext, DetectionRule, InputGap};
use crate::reliability::normalize_source;
use crate::types::{Conflict, ConflictType, DataKind, FacetSnapshot, Observation, Severity, SourceValue};
use serde_json::json;

pub struct DataInconsistencyRule;

impl DetectionRule for DataInconsistencyRule {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::DataInconsistency
    }

    fn detect(
        &self,
        facets: &FacetSnapshot,
        ctx: &DetectionContext,
    ) -> Result<Vec<Conflict>, InputGap> {
        let mut comparable = 0usize;
        let mut conflicts = Vec::new();
        let t = &ctx.thresholds;

        for (kind, observations) in facets.observations_by_kind() {
            let per_source = first_per_source(&observations);
            if per_source.len() < 2 {
                continue;
            }
            comparable += 1;

            let (high, high_value) = extreme(&per_source, |a, b| a > b);
            let (low, low_value) = extreme(&per_source, |a, b| a < b);
            if high_value <= 0.0 {
                continue;
            }

            let ratio = if low_value <= 0.0 {
                f64::INFINITY
            } else {
                high_value / low_value
            };

            let severity = if ratio >= t.ratio_high {
                Severity::High
            } else if ratio >= t.ratio_medium {
                Severity::Medium
            } else if ratio >= t.ratio_low {
                Severity::Low
            } else {
                continue;
            };

            conflicts.push(build_conflict(ctx, kind, severity, high, low, ratio));
        }

        if comparable == 0 {
            return Err(InputGap::new("no fact reported by two distinct sources"));
        }
        Ok(conflicts)
    }
}

fn build_conflict(
    ctx: &DetectionContext,
    kind: DataKind,
    severity: Severity,
    high: &Observation,
    low: &Observation,
    ratio: f64,
) -> Conflict {
    let mut sources = Vec::with_capacity(4);
    for obs in [high, low] {
        sources.push(SourceValue::new(obs.source.as_str(), "value", json!(obs.value)));
    }
    for obs in [high, low] {
        if let Some(size) = obs.sample_size {
            sources.push(SourceValue::new(obs.source.as_str(), "sample_size", json!(size)));
        }
    }

    let ratio_text = if ratio.is_finite() {
        format!("{:.2}x apart", ratio)
    } else {
        "one of them is zero".to_string()
    };
    let description = format!(
        "{} reports {} = {} while {} reports {}; {}",
        high.source,
        kind,
        format_value(high.value),
        low.source,
        format_value(low.value),
        ratio_text
    );

    ctx.conflict(ConflictType::DataInconsistency, severity, kind, sources, description)
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{:.0}", v),
        Some(v) => format!("{:.2}", v),
        None => "?".to_string(),
    }
}

/// First non-negative observation of each distinct source, in input order
fn first_per_source(observations: &[Observation]) -> Vec<&Observation> {
    let mut seen: Vec<String> = Vec::new();
    let mut kept = Vec::new();
    for obs in observations {
        if !obs.value.is_some_and(|v| v >= 0.0) {
            continue;
        }
        let key = normalize_source(&obs.source);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        kept.push(obs);
    }
    kept
}

/// First observation whose value beats all earlier ones
fn extreme<'a>(
    observations: &[&'a Observation],
    better: impl Fn(f64, f64) -> bool,
) -> (&'a Observation, f64) {
    let mut best = observations[0];
    let mut best_value = best.value.unwrap_or_default();
    for &candidate in &observations[1..] {
        let value = candidate.value.unwrap_or_default();
        if better(value, best_value) {
            best = candidate;
            best_value = value;
        }
    }
    (best, best_value)
}
