//! Coherence Scorer
//!
//! Penalty model: start at 100, subtract a fixed penalty per conflict by
//! severity, floor at 0. Any CRITICAL conflict also caps the score at
//! `critical_cap`, however few other conflicts there are.
//!
//! Category sub-scores apply the same model to the conflicts mapped into each
//! category (see `Conflict::categories`).

use crate::types::{CoherenceCategory, CoherenceScore, Conflict, Severity};
use xval_common::config::ScoringConfig;

const MAX_SCORE: f64 = 100.0;

/// Computes coherence scores from detected conflicts
#[derive(Debug, Clone, Default)]
pub struct CoherenceScorer {
    config: ScoringConfig,
}

impl CoherenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Penalty for one conflict of `severity`
    pub fn penalty(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.config.penalty_low,
            Severity::Medium => self.config.penalty_medium,
            Severity::High => self.config.penalty_high,
            Severity::Critical => self.config.penalty_critical,
        }
    }

    /// Overall and per-category coherence for a set of conflicts
    pub fn score(&self, conflicts: &[Conflict]) -> CoherenceScore {
        let overall = self.score_of(conflicts.iter().map(|c| c.severity));

        let category = |category: CoherenceCategory| {
            self.score_of(
                conflicts
                    .iter()
                    .filter(|c| c.categories().contains(&category))
                    .map(|c| c.severity),
            )
        };

        CoherenceScore {
            overall,
            demographic: category(CoherenceCategory::Demographic),
            physical: category(CoherenceCategory::Physical),
            reputation: category(CoherenceCategory::Reputation),
            geographic: category(CoherenceCategory::Geographic),
        }
    }

    fn score_of(&self, severities: impl Iterator<Item = Severity>) -> f64 {
        let mut score = MAX_SCORE;
        let mut has_critical = false;
        for severity in severities {
            score -= self.penalty(severity).max(0.0);
            has_critical |= severity == Severity::Critical;
        }
        if has_critical {
            score = score.min(self.config.critical_cap);
        }
        score.clamp(0.0, MAX_SCORE)
    }
}
