//! Population vs. point-of-interest density
//!
//! - Populated zone (≥ `population_floor`) with zero POIs nearby: HIGH, the
//!   coordinates most likely point at the wrong place.
//! - Sparse zone (< `sparse_population_ceiling`) with many POIs
//!   (≥ `commercial_poi_floor`): LOW, a commercial district. Both facts can be
//!   independently true.

use super::{require, DetectionContext, DetectionRule, InputGap};
use crate::types::{source_label, Conflict, ConflictType, DataKind, FacetSnapshot, Severity, SourceValue};
use serde_json::json;

pub struct PopulationPoiRule;

impl DetectionRule for PopulationPoiRule {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::PopulationPoiMismatch
    }

    fn detect(
        &self,
        facets: &FacetSnapshot,
        ctx: &DetectionContext,
    ) -> Result<Vec<Conflict>, InputGap> {
        let demographics = require(facets.demographics.as_ref(), "demographics facet")?;
        let competition = require(facets.competition.as_ref(), "competition facet")?;
        let population = require(demographics.population, "demographics.population")?;
        let poi_count = require(competition.poi_count, "competition.poi_count")?;
        let t = &ctx.thresholds;

        let demo_source = source_label(&demographics.source, "demographics");
        let poi_source = source_label(&competition.source, "competition");

        let mut sources = vec![
            SourceValue::new(demo_source, "population", json!(population)),
            SourceValue::new(poi_source, "poi_count", json!(poi_count)),
        ];
        let radius = competition.search_radius_m.filter(|r| r.is_finite() && *r > 0.0);
        if let Some(radius) = radius {
            sources.push(SourceValue::new(poi_source, "search_radius_m", json!(radius)));
        }
        let radius_text = radius
            .map(|r| format!(" within {:.0} m", r))
            .unwrap_or_default();

        if population >= t.population_floor && poi_count == 0 {
            return Ok(vec![ctx.conflict(
                ConflictType::PopulationPoiMismatch,
                Severity::High,
                DataKind::PoiDensity,
                sources,
                format!(
                    "{} reports {} inhabitants but {} finds no point of interest{}; \
                     the coordinates are likely wrong",
                    demo_source, population, poi_source, radius_text
                ),
            )]);
        }

        if population < t.sparse_population_ceiling && poi_count >= t.commercial_poi_floor {
            return Ok(vec![ctx.conflict(
                ConflictType::PopulationPoiMismatch,
                Severity::Low,
                DataKind::PoiDensity,
                sources,
                format!(
                    "Only {} inhabitants but {} points of interest{}; \
                     consistent with a commercial district drawing outside footfall",
                    population, poi_count, radius_text
                ),
            )]);
        }

        Ok(Vec::new())
    }
}
