//! Conflict Detector
//!
//! A registry of detection rules, one per conflict type. Each rule reads the
//! facet fields it needs from an immutable `FacetSnapshot` and emits typed
//! conflicts with a severity decided by its own thresholds.
//!
//! # Input gaps
//! A rule whose inputs are missing returns `InputGap` instead of failing. The
//! detector turns the gap into a low-confidence `DetectionNote` and carries on
//! with the other rules: fewer facets simply yield fewer possible conflicts.
//!
//! # Rules
//! 1. **population_poi** - population vs. nearby points of interest
//! 2. **csp_pricing** - socio-professional profile vs. listing price level
//! 3. **reputation_condition** - listing rating vs. visual condition
//! 4. **data_inconsistency** - same numeric fact reported differently
//! 5. **score_mismatch** - agents scoring the same dimension far apart
//! 6. **geographic** - geocoders placing the entity far apart

pub mod csp_pricing;
pub mod data_inconsistency;
pub mod geographic;
pub mod population_poi;
pub mod reputation_condition;
pub mod score_mismatch;

use crate::types::{Conflict, ConflictId, ConflictType, DataKind, FacetSnapshot, Severity, SourceValue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use uuid::Uuid;
use xval_common::config::DetectionThresholds;

pub use csp_pricing::CspPricingRule;
pub use data_inconsistency::DataInconsistencyRule;
pub use geographic::GeographicRule;
pub use population_poi::PopulationPoiRule;
pub use reputation_condition::ReputationConditionRule;
pub use score_mismatch::ScoreMismatchRule;

/// Shared, immutable context for one detection run
#[derive(Debug, Clone)]
pub struct DetectionContext {
    /// Run identifier, namespace of the conflict ids
    pub run_id: Uuid,
    /// Timestamp stamped on every conflict of the run
    pub run_started_at: DateTime<Utc>,
    pub thresholds: DetectionThresholds,
}

impl DetectionContext {
    pub fn new(run_id: Uuid, run_started_at: DateTime<Utc>, thresholds: DetectionThresholds) -> Self {
        Self {
            run_id,
            run_started_at,
            thresholds,
        }
    }

    /// Build a fully-populated conflict with a deterministic id
    pub fn conflict(
        &self,
        conflict_type: ConflictType,
        severity: Severity,
        data_kind: DataKind,
        sources: Vec<SourceValue>,
        description: impl Into<String>,
    ) -> Conflict {
        Conflict {
            id: ConflictId::derive(self.run_id, conflict_type, data_kind, &sources),
            conflict_type,
            severity,
            data_kind,
            sources,
            description: description.into(),
            detected_at: self.run_started_at,
            resolved: false,
        }
    }
}

/// A rule could not run because an input it needs is absent or malformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputGap {
    pub reason: String,
}

impl InputGap {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InputGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Unwrap a required input or report it as missing
pub fn require<T>(value: Option<T>, field: &str) -> Result<T, InputGap> {
    value.ok_or_else(|| InputGap::new(format!("missing {}", field)))
}

/// Detection rule for one conflict type
pub trait DetectionRule: Send + Sync {
    /// Conflict type this rule emits
    fn conflict_type(&self) -> ConflictType;

    /// Inspect the facets and emit conflicts
    ///
    /// Single-pair rules emit at most one conflict. Rules comparing a family
    /// of facts emit at most one conflict per disputed data kind.
    fn detect(
        &self,
        facets: &FacetSnapshot,
        ctx: &DetectionContext,
    ) -> Result<Vec<Conflict>, InputGap>;
}

/// Low-confidence note left by a rule that could not run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionNote {
    pub conflict_type: ConflictType,
    pub message: String,
}

/// Output of a full detection pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionReport {
    pub conflicts: Vec<Conflict>,
    pub notes: Vec<DetectionNote>,
}

/// Default rule for each conflict type
fn rule_for(conflict_type: ConflictType) -> Box<dyn DetectionRule> {
    match conflict_type {
        ConflictType::PopulationPoiMismatch => Box::new(PopulationPoiRule),
        ConflictType::CspPricingMismatch => Box::new(CspPricingRule),
        ConflictType::ReputationConditionMismatch => Box::new(ReputationConditionRule),
        ConflictType::DataInconsistency => Box::new(DataInconsistencyRule),
        ConflictType::ScoreMismatch => Box::new(ScoreMismatchRule),
        ConflictType::GeographicMismatch => Box::new(GeographicRule),
    }
}

/// Registry of detection rules keyed by conflict type
pub struct ConflictDetector {
    rules: BTreeMap<ConflictType, Box<dyn DetectionRule>>,
}

impl ConflictDetector {
    /// Detector with the default rule for every conflict type
    pub fn new() -> Self {
        let mut detector = Self::empty();
        for conflict_type in ConflictType::ALL {
            detector.register(rule_for(conflict_type));
        }
        detector
    }

    /// Detector with no rules registered
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Register (or replace) the rule for its conflict type
    pub fn register(&mut self, rule: Box<dyn DetectionRule>) {
        self.rules.insert(rule.conflict_type(), rule);
    }

    /// Conflict types with a registered rule
    pub fn registered_types(&self) -> Vec<ConflictType> {
        self.rules.keys().copied().collect()
    }

    /// Run a single rule
    ///
    /// Returns an empty list when the rule is not registered or its inputs
    /// are missing.
    pub fn detect(
        &self,
        conflict_type: ConflictType,
        facets: &FacetSnapshot,
        ctx: &DetectionContext,
    ) -> Vec<Conflict> {
        let Some(rule) = self.rules.get(&conflict_type) else {
            return Vec::new();
        };
        match rule.detect(facets, ctx) {
            Ok(conflicts) => conflicts,
            Err(gap) => {
                debug!(conflict_type = %conflict_type, reason = %gap, "Detection rule skipped");
                Vec::new()
            }
        }
    }

    /// Run every registered rule
    ///
    /// Rules are independent; output is ordered by conflict type then data kind.
    pub fn detect_all(&self, facets: &FacetSnapshot, ctx: &DetectionContext) -> DetectionReport {
        let mut report = DetectionReport::default();

        for (conflict_type, rule) in &self.rules {
            match rule.detect(facets, ctx) {
                Ok(mut conflicts) => {
                    debug!(
                        conflict_type = %conflict_type,
                        detected = conflicts.len(),
                        "Detection rule complete"
                    );
                    conflicts.sort_by_key(|c| c.data_kind);
                    report.conflicts.extend(conflicts);
                }
                Err(gap) => {
                    debug!(conflict_type = %conflict_type, reason = %gap, "Detection rule skipped");
                    report.notes.push(DetectionNote {
                        conflict_type: *conflict_type,
                        message: format!("{} check not run: {}", conflict_type, gap),
                    });
                }
            }
        }

        report
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompetitorSnapshot, DemographicSnapshot};

    pub(crate) fn test_context() -> DetectionContext {
        DetectionContext::new(
            Uuid::nil(),
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            DetectionThresholds::default(),
        )
    }

    #[test]
    fn test_registry_covers_every_type() {
        let detector = ConflictDetector::new();
        assert_eq!(detector.registered_types(), ConflictType::ALL.to_vec());
    }

    #[test]
    fn test_empty_snapshot_yields_notes_not_conflicts() {
        let detector = ConflictDetector::new();
        let report = detector.detect_all(&FacetSnapshot::default(), &test_context());
        assert!(report.conflicts.is_empty());
        assert_eq!(report.notes.len(), ConflictType::ALL.len());
    }

    #[test]
    fn test_single_rule_detect() {
        let facets = FacetSnapshot {
            demographics: Some(DemographicSnapshot {
                source: "INSEE".to_string(),
                population: Some(5000),
                ..Default::default()
            }),
            competition: Some(CompetitorSnapshot {
                source: "Google Places".to_string(),
                poi_count: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let detector = ConflictDetector::new();
        let conflicts = detector.detect(ConflictType::PopulationPoiMismatch, &facets, &test_context());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, Severity::High);

        let none = detector.detect(ConflictType::GeographicMismatch, &facets, &test_context());
        assert!(none.is_empty());
    }

    #[test]
    fn test_unregistered_rule_detects_nothing() {
        let detector = ConflictDetector::empty();
        let conflicts = detector.detect(
            ConflictType::PopulationPoiMismatch,
            &FacetSnapshot::default(),
            &test_context(),
        );
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_conflicts_stamped_with_run_timestamp() {
        let ctx = test_context();
        let conflict = ctx.conflict(
            ConflictType::ScoreMismatch,
            Severity::Low,
            DataKind::OverallScore,
            vec![],
            "test",
        );
        assert_eq!(conflict.detected_at, ctx.run_started_at);
        assert!(!conflict.resolved);
    }
}
