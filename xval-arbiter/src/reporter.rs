//! Reporter
//!
//! Assembles the two structured outputs consumed by downstream report
//! generation: the validation output (what was found) and the arbitration
//! output (how it was settled).

use crate::detectors::DetectionNote;
use crate::types::{CoherenceScore, Conflict, ConflictId, ConflictType, Confidence, Resolution, ResolutionType, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Conflict count per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn from_conflicts(conflicts: &[Conflict]) -> Self {
        let mut counts = Self::default();
        for conflict in conflicts {
            match conflict.severity {
                Severity::Low => counts.low += 1,
                Severity::Medium => counts.medium += 1,
                Severity::High => counts.high += 1,
                Severity::Critical => counts.critical += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

/// Validation stage output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutput {
    /// False when the snapshot carried no facet at all
    pub analyzed: bool,
    pub coherence_score: CoherenceScore,
    pub conflicts_detected: usize,
    pub conflicts: Vec<Conflict>,
    pub severity_counts: SeverityCounts,
    pub validation_summary: String,
    pub recommendations: Vec<String>,
}

/// Arbitration stage output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationOutput {
    pub analyzed: bool,
    /// Conflicts settled without upstream revalidation
    pub conflicts_resolved: usize,
    pub resolutions: Vec<Resolution>,
    /// Conflicts still needing revalidation and not retried automatically
    pub unresolved_conflicts: Vec<Conflict>,
    pub arbitration_summary: String,
    /// Severity-weighted mean of resolution confidences
    pub global_confidence: Confidence,
}

/// Builds validation and arbitration outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter;

impl Reporter {
    /// Validation output for one run
    ///
    /// `conflicts` are the arbitrated copies, so their `resolved` flag reflects
    /// the arbitration outcome.
    pub fn validation(
        &self,
        analyzed: bool,
        coherence_score: CoherenceScore,
        conflicts: Vec<Conflict>,
        notes: &[DetectionNote],
    ) -> ValidationOutput {
        let severity_counts = SeverityCounts::from_conflicts(&conflicts);
        let validation_summary = validation_summary(analyzed, &coherence_score, &severity_counts, notes.len());
        let recommendations = recommendations(&conflicts, notes);

        ValidationOutput {
            analyzed,
            coherence_score,
            conflicts_detected: conflicts.len(),
            conflicts,
            severity_counts,
            validation_summary,
            recommendations,
        }
    }

    /// Arbitration output for one run
    pub fn arbitration(
        &self,
        analyzed: bool,
        arbitrated: &[(Conflict, Resolution)],
        retried: &BTreeSet<ConflictId>,
    ) -> ArbitrationOutput {
        let conflicts_resolved = arbitrated.iter().filter(|(_, r)| r.is_settled()).count();
        let unresolved_conflicts: Vec<Conflict> = arbitrated
            .iter()
            .filter(|(c, r)| {
                r.resolution_type == ResolutionType::NeedsRevalidation && !retried.contains(&c.id)
            })
            .map(|(c, _)| c.clone())
            .collect();
        let global_confidence = global_confidence(arbitrated);

        let arbitration_summary = if !analyzed {
            "Nothing to arbitrate: no facet data was provided".to_string()
        } else if arbitrated.is_empty() {
            "No conflicts to arbitrate".to_string()
        } else {
            let retried_count = arbitrated.len() - conflicts_resolved - unresolved_conflicts.len();
            let mut summary = format!(
                "{}/{} conflict(s) resolved, {} awaiting revalidation",
                conflicts_resolved,
                arbitrated.len(),
                unresolved_conflicts.len()
            );
            if retried_count > 0 {
                summary.push_str(&format!(", {} retried automatically", retried_count));
            }
            summary.push_str(&format!("; global confidence {:.2}", global_confidence));
            summary
        };

        ArbitrationOutput {
            analyzed,
            conflicts_resolved,
            resolutions: arbitrated.iter().map(|(_, r)| r.clone()).collect(),
            unresolved_conflicts,
            arbitration_summary,
            global_confidence,
        }
    }
}

/// Severity-weighted mean of resolution confidences, 1.0 when empty
pub fn global_confidence(arbitrated: &[(Conflict, Resolution)]) -> Confidence {
    let (weighted, weights) = arbitrated
        .iter()
        .fold((0.0, 0.0), |(sum, total), (conflict, resolution)| {
            let w = conflict.severity.weight();
            (sum + w * resolution.confidence, total + w)
        });
    if weights > 0.0 {
        (weighted / weights).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn validation_summary(
    analyzed: bool,
    score: &CoherenceScore,
    counts: &SeverityCounts,
    notes: usize,
) -> String {
    if !analyzed {
        return "No facet data to validate".to_string();
    }

    let mut summary = if counts.total() == 0 {
        format!("No conflicts detected; coherence {:.0}/100", score.overall)
    } else {
        let mut parts = Vec::new();
        for (count, label) in [
            (counts.critical, "critical"),
            (counts.high, "high"),
            (counts.medium, "medium"),
            (counts.low, "low"),
        ] {
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }
        format!(
            "{} conflict(s) detected ({}); coherence {:.0}/100",
            counts.total(),
            parts.join(", "),
            score.overall
        )
    };

    if notes > 0 {
        summary.push_str(&format!("; {} check(s) skipped for missing data", notes));
    }
    summary
}

fn recommendation_for(conflict_type: ConflictType) -> &'static str {
    match conflict_type {
        ConflictType::PopulationPoiMismatch => {
            "Verify the geocoded position before relying on local market figures"
        }
        ConflictType::CspPricingMismatch => {
            "Review pricing against the socio-professional profile of the catchment"
        }
        ConflictType::ReputationConditionMismatch => {
            "Confirm the reputation listing matches the inspected premises"
        }
        ConflictType::DataInconsistency => {
            "Cross-check figures that sources report differently before quoting them"
        }
        ConflictType::ScoreMismatch => "Review agent scores that disagree on the same dimension",
        ConflictType::GeographicMismatch => "Re-geocode the entity with strict address matching",
    }
}

/// One line per distinct conflict type, then one per detection note
fn recommendations(conflicts: &[Conflict], notes: &[DetectionNote]) -> Vec<String> {
    let types: BTreeSet<ConflictType> = conflicts.iter().map(|c| c.conflict_type).collect();
    let mut lines: Vec<String> = types
        .into_iter()
        .map(|t| recommendation_for(t).to_string())
        .collect();
    lines.extend(notes.iter().map(|n| format!("Low confidence: {}", n.message)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::tests::make_conflict;
    use crate::types::DataKind;

    fn conflict(conflict_type: ConflictType, severity: Severity) -> Conflict {
        make_conflict(conflict_type, severity, DataKind::OverallScore, vec![])
    }

    fn resolution(conflict: &Conflict, kind: ResolutionType, confidence: f64) -> Resolution {
        Resolution::new(conflict.id, kind, confidence, "test")
    }

    #[test]
    fn test_global_confidence_is_severity_weighted() {
        let low = conflict(ConflictType::ScoreMismatch, Severity::Low);
        let critical = conflict(ConflictType::GeographicMismatch, Severity::Critical);
        let pairs = vec![
            (low.clone(), resolution(&low, ResolutionType::Ignored, 0.4)),
            (critical.clone(), resolution(&critical, ResolutionType::Rejected, 0.95)),
        ];
        let expected = (0.4 * 1.0 + 0.95 * 4.0) / 5.0;
        assert!((global_confidence(&pairs) - expected).abs() < 1e-12);
        assert_eq!(global_confidence(&[]), 1.0);
    }

    #[test]
    fn test_retried_conflicts_are_not_unresolved() {
        let a = conflict(ConflictType::ScoreMismatch, Severity::High);
        let b = conflict(ConflictType::PopulationPoiMismatch, Severity::High);
        let pairs = vec![
            (a.clone(), resolution(&a, ResolutionType::NeedsRevalidation, 0.5)),
            (b.clone(), resolution(&b, ResolutionType::NeedsRevalidation, 0.7)),
        ];
        let retried: BTreeSet<ConflictId> = [a.id].into_iter().collect();
        let output = Reporter.arbitration(true, &pairs, &retried);
        assert_eq!(output.conflicts_resolved, 0);
        assert_eq!(output.unresolved_conflicts.len(), 1);
        assert_eq!(output.unresolved_conflicts[0].id, b.id);
        assert!(output.arbitration_summary.contains("retried"));
    }

    #[test]
    fn test_recommendations_per_type_and_note() {
        let conflicts = vec![
            conflict(ConflictType::ScoreMismatch, Severity::Low),
            conflict(ConflictType::ScoreMismatch, Severity::High),
            conflict(ConflictType::GeographicMismatch, Severity::Critical),
        ];
        let notes = vec![DetectionNote {
            conflict_type: ConflictType::CspPricingMismatch,
            message: "CSP_PRICING_MISMATCH check not run: missing demographics facet".to_string(),
        }];
        let output = Reporter.validation(true, CoherenceScore::default(), conflicts, &notes);
        assert_eq!(output.recommendations.len(), 3);
        assert_eq!(output.severity_counts.total(), 3);
        assert_eq!(output.conflicts_detected, 3);
        assert!(output.validation_summary.contains("1 critical"));
    }

    #[test]
    fn test_unanalyzed_output() {
        let output = Reporter.validation(false, CoherenceScore::default(), vec![], &[]);
        assert!(!output.analyzed);
        assert_eq!(output.coherence_score.overall, 100.0);
        let arbitration = Reporter.arbitration(false, &[], &BTreeSet::new());
        assert_eq!(arbitration.global_confidence, 1.0);
    }
}
