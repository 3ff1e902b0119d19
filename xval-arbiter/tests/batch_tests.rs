//! Concurrent batch validation
//!
//! - reports come back in input order whatever the completion order
//! - batch output matches sequential runs exactly
//! - engine built from a TOML file applies its thresholds

use chrono::{DateTime, Utc};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use xval_arbiter::types::{CompetitorSnapshot, DemographicSnapshot};
use xval_arbiter::{
    run_batch, EngineConfig, FacetSnapshot, PipelineError, RunContext, Severity, ValidationEngine,
};
use xval_common::config::load_toml_config;

fn snapshot(index: usize) -> FacetSnapshot {
    FacetSnapshot {
        entity_id: format!("site-{:03}", index),
        demographics: Some(DemographicSnapshot {
            source: "INSEE".to_string(),
            population: Some(1000 + 500 * index as u64),
            ..Default::default()
        }),
        competition: Some(CompetitorSnapshot {
            source: "OpenStreetMap".to_string(),
            poi_count: Some(if index % 2 == 0 { 0 } else { 25 }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn jobs(count: usize) -> Vec<(FacetSnapshot, RunContext)> {
    let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
    (0..count)
        .map(|i| {
            let facets = snapshot(i);
            let ctx = RunContext::deterministic(&facets.entity_id, at);
            (facets, ctx)
        })
        .collect()
}

#[tokio::test]
async fn test_batch_preserves_input_order() {
    let engine = Arc::new(ValidationEngine::default());
    let reports = run_batch(engine, jobs(24), 4).await.unwrap();

    assert_eq!(reports.len(), 24);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.entity_id, format!("site-{:03}", i));
    }
}

#[tokio::test]
async fn test_batch_matches_sequential_runs() {
    let engine = Arc::new(ValidationEngine::default());
    let input = jobs(10);

    let sequential: Vec<_> = input
        .iter()
        .map(|(facets, ctx)| engine.run(facets, ctx))
        .collect();
    let concurrent = run_batch(Arc::clone(&engine), input, 3).await.unwrap();

    assert_eq!(concurrent, sequential);
}

#[tokio::test]
async fn test_empty_batch() {
    let engine = Arc::new(ValidationEngine::default());
    let reports = run_batch(engine, Vec::new(), 2).await.unwrap();
    assert!(reports.is_empty());
}

#[tokio::test]
async fn test_zero_concurrency_is_rejected() {
    let engine = Arc::new(ValidationEngine::default());
    let result = run_batch(engine, jobs(1), 0).await;
    assert!(matches!(result, Err(PipelineError::InvalidConcurrency(0))));
}

#[test]
fn test_engine_applies_configured_thresholds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("xval.toml");
    fs::write(&path, "[detection]\npopulation_floor = 10000\n").unwrap();
    let config = load_toml_config(&path).unwrap();

    // 5000 inhabitants, no POI: below the raised floor
    let facets = snapshot(8);
    let ctx = RunContext::deterministic(&facets.entity_id, Utc::now());

    let strict = ValidationEngine::new(EngineConfig::from(&config)).run(&facets, &ctx);
    assert_eq!(strict.validation.conflicts_detected, 0);

    let default = ValidationEngine::default().run(&facets, &ctx);
    assert_eq!(default.validation.conflicts[0].severity, Severity::High);
}
