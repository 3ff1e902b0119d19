//! xval-arbiter library interface
//!
//! Cross-source validation and arbitration for multi-agent entity analyses.
//!
//! # Architecture
//! - **Detection** (`detectors`): one rule per conflict type
//! - **Scoring** (`scoring`): coherence penalty model
//! - **Prioritization** (`prioritizer`, `reliability`): static source reliability
//! - **Arbitration** (`arbitration`): one policy per conflict type
//! - **Reporting** (`reporter`): validation and arbitration outputs
//! - **Pipeline** (`pipeline`): per-entity runs and concurrent batches

pub mod arbitration;
pub mod detectors;
pub mod pipeline;
pub mod prioritizer;
pub mod reliability;
pub mod reporter;
pub mod scoring;
pub mod types;

pub use arbitration::{ArbitrationPolicy, Arbitrator};
pub use detectors::{ConflictDetector, DetectionContext, DetectionReport, DetectionRule};
pub use pipeline::{run_batch, EngineConfig, EngineReport, PipelineError, RunContext, ValidationEngine};
pub use prioritizer::{Recommendation, SourcePrioritizer, SourcePriority};
pub use reporter::{ArbitrationOutput, Reporter, SeverityCounts, ValidationOutput};
pub use scoring::CoherenceScorer;
pub use types::{
    CoherenceScore, Conflict, ConflictId, ConflictType, DataKind, FacetSnapshot, Resolution,
    ResolutionType, Severity,
};
