//! Source Prioritizer
//!
//! Ranks the sources involved in a conflict by their declared reliability for
//! the disputed data kind and turns the gap between the top two into a
//! recommendation:
//! - gap > `prefer_gap` → prefer the top source
//! - gap < `hybrid_gap` → treat as equally reliable (hybrid resolution)
//! - otherwise → lean toward the top source
//! - fewer than two distinct sources → undetermined

use crate::reliability::{self, normalize_source};
use crate::types::{Conflict, ConflictType, DataKind};
use serde::Serialize;
use tracing::debug;
use xval_common::config::PrioritizationConfig;

/// One ranked source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSource {
    pub source: String,
    pub reliability: f64,
    pub rationale: String,
}

/// Prioritizer verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// Reliability gap large enough to prefer one source outright
    Prefer { source: String, gap: f64 },
    /// Moderate gap: favour the top source, corroboration advised
    LeanToward { source: String, gap: f64 },
    /// Sources are equally reliable
    Hybrid,
    /// Not enough distinct sources to rank
    Undetermined,
}

/// Ranking of the sources of one conflict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcePriority {
    pub conflict_type: ConflictType,
    pub data_kind: DataKind,
    /// Sources sorted by descending reliability (ties by name)
    pub ranked: Vec<RankedSource>,
    pub recommendation: Recommendation,
    pub summary: String,
}

impl SourcePriority {
    /// Highest ranked source
    pub fn top(&self) -> Option<&RankedSource> {
        self.ranked.first()
    }

    /// Lowest ranked source
    pub fn bottom(&self) -> Option<&RankedSource> {
        self.ranked.last()
    }

    /// Reliability declared for `source`, if it was ranked
    pub fn reliability_of(&self, source: &str) -> Option<f64> {
        let key = normalize_source(source);
        self.ranked
            .iter()
            .find(|r| normalize_source(&r.source) == key)
            .map(|r| r.reliability)
    }

    /// Source to prefer when the gap is at least moderate
    pub fn favoured_source(&self) -> Option<&str> {
        match &self.recommendation {
            Recommendation::Prefer { source, .. } | Recommendation::LeanToward { source, .. } => {
                Some(source.as_str())
            }
            Recommendation::Hybrid | Recommendation::Undetermined => None,
        }
    }

    /// Source to prefer outright (large gap only)
    pub fn preferred_source(&self) -> Option<&str> {
        match &self.recommendation {
            Recommendation::Prefer { source, .. } => Some(source.as_str()),
            _ => None,
        }
    }
}

/// Ranks sources using the static reliability table
#[derive(Debug, Clone, Default)]
pub struct SourcePrioritizer {
    config: PrioritizationConfig,
}

impl SourcePrioritizer {
    pub fn new(config: PrioritizationConfig) -> Self {
        Self { config }
    }

    /// Rank the sources of a detected conflict
    pub fn for_conflict(&self, conflict: &Conflict) -> SourcePriority {
        self.prioritize(
            conflict.conflict_type,
            conflict.data_kind,
            &conflict.source_names(),
        )
    }

    /// Rank `sources` for `data_kind`
    pub fn prioritize(
        &self,
        conflict_type: ConflictType,
        data_kind: DataKind,
        sources: &[&str],
    ) -> SourcePriority {
        let mut seen: Vec<String> = Vec::new();
        let mut ranked: Vec<RankedSource> = Vec::new();
        for source in sources {
            let key = normalize_source(source);
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);

            let reliability = reliability::lookup(source, data_kind);
            ranked.push(RankedSource {
                source: source.to_string(),
                reliability: reliability.score,
                rationale: reliability.rationale,
            });
        }

        ranked.sort_by(|a, b| {
            b.reliability
                .total_cmp(&a.reliability)
                .then_with(|| a.source.cmp(&b.source))
        });

        let recommendation = match (ranked.first(), ranked.get(1)) {
            (Some(first), Some(second)) => {
                let gap = first.reliability - second.reliability;
                if gap > self.config.prefer_gap {
                    Recommendation::Prefer {
                        source: first.source.clone(),
                        gap,
                    }
                } else if gap < self.config.hybrid_gap {
                    Recommendation::Hybrid
                } else {
                    Recommendation::LeanToward {
                        source: first.source.clone(),
                        gap,
                    }
                }
            }
            _ => Recommendation::Undetermined,
        };

        let summary = summarize(&ranked, &recommendation, data_kind);

        debug!(
            conflict_type = %conflict_type,
            data_kind = %data_kind,
            sources = ranked.len(),
            recommendation = ?recommendation,
            "Source prioritization complete"
        );

        SourcePriority {
            conflict_type,
            data_kind,
            ranked,
            recommendation,
            summary,
        }
    }
}

fn summarize(ranked: &[RankedSource], recommendation: &Recommendation, kind: DataKind) -> String {
    match recommendation {
        Recommendation::Prefer { source, gap } => format!(
            "Prefer {} for {} (reliability {:.0}, {:.0} points ahead)",
            source, kind, ranked[0].reliability, gap
        ),
        Recommendation::LeanToward { source, gap } => format!(
            "Lean toward {} for {} ({:.0} points ahead); corroborate before relying on it",
            source, kind, gap
        ),
        Recommendation::Hybrid => format!(
            "Treat {} as equally reliable for {}; hybrid resolution",
            ranked
                .iter()
                .map(|r| r.source.as_str())
                .collect::<Vec<_>>()
                .join(" and "),
            kind
        ),
        Recommendation::Undetermined => {
            format!("Not enough distinct sources to rank for {}", kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prioritizer() -> SourcePrioritizer {
        SourcePrioritizer::new(PrioritizationConfig::default())
    }

    #[test]
    fn test_large_gap_prefers_top_source() {
        let p = prioritizer().prioritize(
            ConflictType::GeographicMismatch,
            DataKind::Location,
            &["Nominatim", "BAN"],
        );
        assert_eq!(p.top().unwrap().source, "BAN");
        assert_eq!(
            p.recommendation,
            Recommendation::Prefer {
                source: "BAN".to_string(),
                gap: 35.0
            }
        );
        assert_eq!(p.preferred_source(), Some("BAN"));
    }

    #[test]
    fn test_small_gap_is_hybrid() {
        // Google Places 80 vs TripAdvisor 75
        let p = prioritizer().prioritize(
            ConflictType::DataInconsistency,
            DataKind::Rating,
            &["TripAdvisor", "Google Places"],
        );
        assert_eq!(p.recommendation, Recommendation::Hybrid);
        assert_eq!(p.favoured_source(), None);
    }

    #[test]
    fn test_moderate_gap_leans() {
        // Google Places 85 vs OpenStreetMap 70
        let p = prioritizer().prioritize(
            ConflictType::DataInconsistency,
            DataKind::PoiDensity,
            &["OpenStreetMap", "Google Places"],
        );
        assert!(matches!(p.recommendation, Recommendation::LeanToward { .. }));
        assert_eq!(p.favoured_source(), Some("Google Places"));
        assert_eq!(p.preferred_source(), None);
    }

    #[test]
    fn test_single_source_is_undetermined() {
        let p = prioritizer().prioritize(
            ConflictType::ScoreMismatch,
            DataKind::OverallScore,
            &["Demographic Agent", "demographic_agent"],
        );
        assert_eq!(p.ranked.len(), 1);
        assert_eq!(p.recommendation, Recommendation::Undetermined);
    }

    #[test]
    fn test_unknown_sources_tie_sorted_by_name() {
        let p = prioritizer().prioritize(
            ConflictType::ScoreMismatch,
            DataKind::OverallScore,
            &["zeta", "alpha"],
        );
        assert_eq!(p.ranked[0].source, "alpha");
        assert_eq!(p.recommendation, Recommendation::Hybrid);
        assert_eq!(p.reliability_of("ZETA"), Some(50.0));
    }
}
