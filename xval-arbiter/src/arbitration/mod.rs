//! Arbitration Engine
//!
//! A registry of arbitration policies, one per conflict type. Each policy
//! consumes one conflict plus the prioritizer's ranking of its sources and
//! walks a fixed decision tree to a `Resolution`.
//!
//! # Fallback
//! `arbitrate` always returns a resolution. A conflict type with no registered
//! policy, or a policy that cannot find the fields it expects, resolves to
//! NEEDS_REVALIDATION at low confidence (never above 0.5).

pub mod csp_pricing;
pub mod data_inconsistency;
pub mod geographic;
pub mod population_poi;
pub mod reputation_condition;
pub mod score_mismatch;

use crate::prioritizer::{SourcePrioritizer, SourcePriority};
use crate::types::{Conflict, ConflictId, ConflictType, Resolution, ResolutionType};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use xval_common::config::{ArbitrationThresholds, PrioritizationConfig};

pub use csp_pricing::CspPricingPolicy;
pub use data_inconsistency::DataInconsistencyPolicy;
pub use geographic::GeographicPolicy;
pub use population_poi::PopulationPoiPolicy;
pub use reputation_condition::ReputationConditionPolicy;
pub use score_mismatch::ScoreMismatchPolicy;

/// Upper bound for the confidence of a fallback resolution
pub const MAX_FALLBACK_CONFIDENCE: f64 = 0.5;

/// Arbitration policy for one conflict type
pub trait ArbitrationPolicy: Send + Sync {
    /// Conflict type this policy resolves
    fn conflict_type(&self) -> ConflictType;

    /// Resolve one conflict
    ///
    /// Returns None when the conflict lacks the fields the policy expects.
    fn resolve(
        &self,
        conflict: &Conflict,
        priority: &SourcePriority,
        thresholds: &ArbitrationThresholds,
    ) -> Option<Resolution>;
}

/// Default policy for each conflict type
fn policy_for(conflict_type: ConflictType) -> Box<dyn ArbitrationPolicy> {
    match conflict_type {
        ConflictType::PopulationPoiMismatch => Box::new(PopulationPoiPolicy),
        ConflictType::CspPricingMismatch => Box::new(CspPricingPolicy),
        ConflictType::ReputationConditionMismatch => Box::new(ReputationConditionPolicy),
        ConflictType::DataInconsistency => Box::new(DataInconsistencyPolicy),
        ConflictType::ScoreMismatch => Box::new(ScoreMismatchPolicy),
        ConflictType::GeographicMismatch => Box::new(GeographicPolicy),
    }
}

/// Registry of arbitration policies keyed by conflict type
pub struct Arbitrator {
    policies: BTreeMap<ConflictType, Box<dyn ArbitrationPolicy>>,
    prioritizer: SourcePrioritizer,
    thresholds: ArbitrationThresholds,
}

impl Arbitrator {
    /// Arbitrator with the default policy for every conflict type
    pub fn new(prioritization: PrioritizationConfig, thresholds: ArbitrationThresholds) -> Self {
        let mut arbitrator = Self::empty(prioritization, thresholds);
        for conflict_type in ConflictType::ALL {
            arbitrator.register(policy_for(conflict_type));
        }
        arbitrator
    }

    /// Arbitrator with no policies registered
    pub fn empty(prioritization: PrioritizationConfig, thresholds: ArbitrationThresholds) -> Self {
        Self {
            policies: BTreeMap::new(),
            prioritizer: SourcePrioritizer::new(prioritization),
            thresholds,
        }
    }

    /// Register (or replace) the policy for its conflict type
    pub fn register(&mut self, policy: Box<dyn ArbitrationPolicy>) {
        self.policies.insert(policy.conflict_type(), policy);
    }

    pub fn registered_types(&self) -> Vec<ConflictType> {
        self.policies.keys().copied().collect()
    }

    /// Resolve one conflict
    pub fn arbitrate(&self, conflict: &Conflict) -> Resolution {
        let priority = self.prioritizer.for_conflict(conflict);

        let Some(policy) = self.policies.get(&conflict.conflict_type) else {
            warn!(
                conflict_id = %conflict.id,
                conflict_type = %conflict.conflict_type,
                "No arbitration policy registered"
            );
            return self.fallback(conflict, "no arbitration policy is registered for this conflict type");
        };

        match policy.resolve(conflict, &priority, &self.thresholds) {
            Some(resolution) => {
                debug!(
                    conflict_id = %conflict.id,
                    conflict_type = %conflict.conflict_type,
                    resolution = %resolution.resolution_type,
                    confidence = resolution.confidence,
                    "Conflict arbitrated"
                );
                resolution
            }
            None => {
                warn!(
                    conflict_id = %conflict.id,
                    conflict_type = %conflict.conflict_type,
                    "Conflict lacks the fields its policy expects"
                );
                self.fallback(conflict, "the conflict lacks the values needed to arbitrate it")
            }
        }
    }

    /// Resolve every conflict once
    ///
    /// Returns one (conflict, resolution) pair per distinct conflict id, in
    /// input order. The returned conflict copy is marked resolved unless it
    /// still needs revalidation.
    pub fn arbitrate_all(&self, conflicts: &[Conflict]) -> Vec<(Conflict, Resolution)> {
        let mut seen: BTreeSet<ConflictId> = BTreeSet::new();
        let mut pairs = Vec::with_capacity(conflicts.len());

        for conflict in conflicts {
            if !seen.insert(conflict.id) {
                debug!(conflict_id = %conflict.id, "Duplicate conflict skipped");
                continue;
            }
            let resolution = self.arbitrate(conflict);
            let settled = resolution.is_settled();
            pairs.push((conflict.clone().into_resolved(settled), resolution));
        }

        pairs
    }

    fn fallback(&self, conflict: &Conflict, reason: &str) -> Resolution {
        let confidence = self
            .thresholds
            .fallback_confidence
            .min(MAX_FALLBACK_CONFIDENCE);
        Resolution::new(
            conflict.id,
            ResolutionType::NeedsRevalidation,
            confidence,
            format!("Cannot arbitrate automatically: {}", reason),
        )
        .with_action(format!(
            "Re-fetch the data behind this {} conflict and re-run validation",
            conflict.conflict_type
        ))
    }
}

impl Default for Arbitrator {
    fn default() -> Self {
        Self::new(PrioritizationConfig::default(), ArbitrationThresholds::default())
    }
}

/// Reliability-weighted mean of (source, value) pairs
///
/// Sources missing from the ranking weigh as much as the neutral default.
pub(crate) fn weighted_value(values: &[(&str, f64)], priority: &SourcePriority) -> Option<f64> {
    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for (source, value) in values {
        let weight = priority
            .reliability_of(source)
            .unwrap_or(crate::reliability::NEUTRAL_RELIABILITY)
            .max(0.0);
        total += value * weight;
        weight_sum += weight;
    }
    if weight_sum > 0.0 {
        Some(total / weight_sum)
    } else if values.is_empty() {
        None
    } else {
        Some(values.iter().map(|(_, v)| v).sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::detectors::DetectionContext;
    use crate::types::{DataKind, Severity, SourceValue};
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use uuid::Uuid;
    use xval_common::config::DetectionThresholds;

    pub(crate) fn make_conflict(
        conflict_type: ConflictType,
        severity: Severity,
        data_kind: DataKind,
        sources: Vec<SourceValue>,
    ) -> Conflict {
        DetectionContext::new(
            Uuid::nil(),
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            DetectionThresholds::default(),
        )
        .conflict(conflict_type, severity, data_kind, sources, "test conflict")
    }

    pub(crate) fn resolve_with(conflict: &Conflict) -> Resolution {
        Arbitrator::default().arbitrate(conflict)
    }

    fn score_conflict() -> Conflict {
        make_conflict(
            ConflictType::ScoreMismatch,
            Severity::High,
            DataKind::OverallScore,
            vec![
                SourceValue::new("Local Market Agent", "score", json!(90.0)),
                SourceValue::new("Visual Agent", "score", json!(30.0)),
            ],
        )
    }

    #[test]
    fn test_registry_covers_every_type() {
        assert_eq!(Arbitrator::default().registered_types(), ConflictType::ALL.to_vec());
    }

    #[test]
    fn test_missing_policy_falls_back() {
        let arbitrator = Arbitrator::empty(PrioritizationConfig::default(), ArbitrationThresholds::default());
        let resolution = arbitrator.arbitrate(&score_conflict());
        assert_eq!(resolution.resolution_type, ResolutionType::NeedsRevalidation);
        assert!(resolution.confidence <= MAX_FALLBACK_CONFIDENCE);
        assert!(resolution.action_required.is_some());
    }

    #[test]
    fn test_fallback_confidence_is_capped() {
        let thresholds = ArbitrationThresholds {
            fallback_confidence: 0.9,
            ..Default::default()
        };
        let arbitrator = Arbitrator::empty(PrioritizationConfig::default(), thresholds);
        let resolution = arbitrator.arbitrate(&score_conflict());
        assert_eq!(resolution.confidence, MAX_FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_policy_without_fields_falls_back() {
        let conflict = make_conflict(
            ConflictType::ScoreMismatch,
            Severity::High,
            DataKind::OverallScore,
            vec![SourceValue::new("Visual Agent", "note", json!("n/a"))],
        );
        let resolution = resolve_with(&conflict);
        assert_eq!(resolution.resolution_type, ResolutionType::NeedsRevalidation);
        assert!(resolution.confidence <= MAX_FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_arbitrate_all_dedupes_ids() {
        let conflict = score_conflict();
        let pairs = Arbitrator::default().arbitrate_all(&[conflict.clone(), conflict.clone()]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1.conflict_id, conflict.id);
    }

    #[test]
    fn test_arbitrate_all_marks_settled_conflicts() {
        let settled = make_conflict(
            ConflictType::ReputationConditionMismatch,
            Severity::Medium,
            DataKind::VisualCondition,
            vec![
                SourceValue::new("Google Places", "rating", json!(2.1)),
                SourceValue::new("Vision", "condition_score", json!(8.5)),
            ],
        );
        let pairs = Arbitrator::default().arbitrate_all(&[settled.clone(), score_conflict()]);
        assert!(pairs[0].0.resolved);
        assert!(!pairs[1].0.resolved);
        // Input is never mutated
        assert!(!settled.resolved);
    }

    #[test]
    fn test_weighted_value() {
        let priority = SourcePrioritizer::default().prioritize(
            ConflictType::DataInconsistency,
            DataKind::Population,
            &["INSEE", "Unknown Blog"],
        );
        // INSEE 95, unknown 50
        let value = weighted_value(&[("INSEE", 1000.0), ("Unknown Blog", 2450.0)], &priority).unwrap();
        assert!((value - (1000.0 * 95.0 + 2450.0 * 50.0) / 145.0).abs() < 1e-9);
        assert_eq!(weighted_value(&[], &priority), None);
    }
}
