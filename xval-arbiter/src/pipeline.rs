//! Validation Pipeline
//!
//! Runs the four stages for one entity snapshot:
//! 1. Detect conflicts (all rules, independent)
//! 2. Score coherence
//! 3. Arbitrate each conflict once
//! 4. Build validation and arbitration outputs
//!
//! The engine is pure over its inputs: the same snapshot and run context give
//! the same report. Batch runs fan out over the blocking pool.

use crate::arbitration::Arbitrator;
use crate::detectors::{ConflictDetector, DetectionContext};
use crate::reporter::{ArbitrationOutput, Reporter, ValidationOutput};
use crate::scoring::CoherenceScorer;
use crate::types::{ConflictId, FacetSnapshot};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;
use xval_common::config::{
    ArbitrationThresholds, DetectionThresholds, PrioritizationConfig, ScoringConfig,
};
use xval_common::TomlConfig;

/// Namespace for run ids derived from (entity, start time)
const RUN_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9b1d_4c3a_8e27_51d0_a7f3_c912);

/// Pipeline-level errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Batch concurrency must be at least 1
    #[error("Invalid concurrency: {0}")]
    InvalidConcurrency(usize),

    /// A batch worker panicked or was cancelled
    #[error("Batch job {index} failed: {source}")]
    JobFailed {
        index: usize,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Engine configuration (the engine-relevant part of `TomlConfig`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub detection: DetectionThresholds,
    pub prioritization: PrioritizationConfig,
    pub arbitration: ArbitrationThresholds,
}

impl From<&TomlConfig> for EngineConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            scoring: config.scoring.clone(),
            detection: config.detection.clone(),
            prioritization: config.prioritization.clone(),
            arbitration: config.arbitration.clone(),
        }
    }
}

/// Per-run parameters supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    /// Namespace of the conflict ids of this run
    pub run_id: Uuid,
    /// Timestamp stamped on every conflict of this run
    pub started_at: DateTime<Utc>,
    /// Conflicts the caller retries automatically; never reported as unresolved
    #[serde(default)]
    pub retried: BTreeSet<ConflictId>,
}

impl RunContext {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            retried: BTreeSet::new(),
        }
    }

    /// Run context whose id is derived from the entity and start time
    pub fn deterministic(entity_id: &str, started_at: DateTime<Utc>) -> Self {
        let name = format!("{}|{}", entity_id, started_at.to_rfc3339());
        Self::new(Uuid::new_v5(&RUN_NAMESPACE, name.as_bytes()), started_at)
    }

    /// Fresh random run id, started now
    pub fn now() -> Self {
        Self::new(Uuid::new_v4(), Utc::now())
    }

    pub fn with_retried(mut self, retried: impl IntoIterator<Item = ConflictId>) -> Self {
        self.retried.extend(retried);
        self
    }
}

/// Full report for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineReport {
    pub entity_id: String,
    pub run_id: Uuid,
    pub validation: ValidationOutput,
    pub arbitration: ArbitrationOutput,
}

/// Detection, scoring, arbitration and reporting for one snapshot at a time
pub struct ValidationEngine {
    detector: ConflictDetector,
    scorer: CoherenceScorer,
    arbitrator: Arbitrator,
    reporter: Reporter,
    thresholds: DetectionThresholds,
}

impl ValidationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            detector: ConflictDetector::new(),
            scorer: CoherenceScorer::new(config.scoring),
            arbitrator: Arbitrator::new(config.prioritization, config.arbitration),
            reporter: Reporter,
            thresholds: config.detection,
        }
    }

    /// Engine with custom detector and arbitrator registries
    pub fn with_components(
        config: EngineConfig,
        detector: ConflictDetector,
        arbitrator: Arbitrator,
    ) -> Self {
        Self {
            detector,
            scorer: CoherenceScorer::new(config.scoring),
            arbitrator,
            reporter: Reporter,
            thresholds: config.detection,
        }
    }

    /// Validate and arbitrate one snapshot
    pub fn run(&self, facets: &FacetSnapshot, ctx: &RunContext) -> EngineReport {
        let analyzed = facets.has_any_facet();
        let detection_ctx = DetectionContext::new(ctx.run_id, ctx.started_at, self.thresholds.clone());

        let detection = self.detector.detect_all(facets, &detection_ctx);
        let coherence = self.scorer.score(&detection.conflicts);
        debug!(
            entity_id = %facets.entity_id,
            conflicts = detection.conflicts.len(),
            notes = detection.notes.len(),
            coherence = coherence.overall,
            "Detection complete"
        );

        let arbitrated = self.arbitrator.arbitrate_all(&detection.conflicts);
        let arbitration = self.reporter.arbitration(analyzed, &arbitrated, &ctx.retried);
        let conflicts = arbitrated.into_iter().map(|(conflict, _)| conflict).collect();
        let validation = self
            .reporter
            .validation(analyzed, coherence, conflicts, &detection.notes);

        info!(
            entity_id = %facets.entity_id,
            run_id = %ctx.run_id,
            coherence = validation.coherence_score.overall,
            conflicts = validation.conflicts_detected,
            resolved = arbitration.conflicts_resolved,
            unresolved = arbitration.unresolved_conflicts.len(),
            global_confidence = arbitration.global_confidence,
            "Validation run complete"
        );

        EngineReport {
            entity_id: facets.entity_id.clone(),
            run_id: ctx.run_id,
            validation,
            arbitration,
        }
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Run many snapshots concurrently
///
/// Each job runs on the blocking pool with at most `concurrency` in flight.
/// Reports are returned in input order.
pub async fn run_batch(
    engine: Arc<ValidationEngine>,
    jobs: Vec<(FacetSnapshot, RunContext)>,
    concurrency: usize,
) -> Result<Vec<EngineReport>, PipelineError> {
    if concurrency == 0 {
        return Err(PipelineError::InvalidConcurrency(concurrency));
    }
    let total = jobs.len();

    let results: Vec<(usize, Result<EngineReport, tokio::task::JoinError>)> =
        stream::iter(jobs.into_iter().enumerate())
            .map(|(index, (facets, ctx))| {
                let engine = Arc::clone(&engine);
                async move {
                    let report =
                        tokio::task::spawn_blocking(move || engine.run(&facets, &ctx)).await;
                    (index, report)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

    let mut ordered: Vec<Option<EngineReport>> = (0..total).map(|_| None).collect();
    for (index, result) in results {
        let report = result.map_err(|source| PipelineError::JobFailed { index, source })?;
        ordered[index] = Some(report);
    }

    info!(jobs = total, concurrency, "Batch complete");
    Ok(ordered.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_run_id() {
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let a = RunContext::deterministic("site-42", at);
        let b = RunContext::deterministic("site-42", at);
        let c = RunContext::deterministic("site-43", at);
        assert_eq!(a.run_id, b.run_id);
        assert_ne!(a.run_id, c.run_id);
    }

    #[test]
    fn test_empty_snapshot_is_not_analyzed() {
        let engine = ValidationEngine::default();
        let ctx = RunContext::deterministic("empty", Utc::now());
        let report = engine.run(&FacetSnapshot::default(), &ctx);
        assert!(!report.validation.analyzed);
        assert_eq!(report.validation.coherence_score.overall, 100.0);
        assert_eq!(report.validation.conflicts_detected, 0);
        assert_eq!(report.arbitration.global_confidence, 1.0);
    }

    #[test]
    fn test_engine_config_from_toml() {
        let mut toml = TomlConfig::default();
        toml.scoring.critical_cap = 35.0;
        let config = EngineConfig::from(&toml);
        assert_eq!(config.scoring.critical_cap, 35.0);
        assert_eq!(config.detection, DetectionThresholds::default());
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let engine = Arc::new(ValidationEngine::default());
        let result = run_batch(engine, vec![], 0).await;
        assert!(matches!(result, Err(PipelineError::InvalidConcurrency(0))));
    }
}
