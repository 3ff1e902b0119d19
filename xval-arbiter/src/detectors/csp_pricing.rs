//! Socio-professional profile vs. listing price level
//!
//! Both outcomes are expectation mismatches, not errors:
//! - affluent profile + deep-discount pricing: opportunity signal (MEDIUM)
//! - modest profile + premium pricing: risk signal (MEDIUM, HIGH at luxury level)

use super::{require, DetectionContext, DetectionRule, InputGap};
use crate::types::{source_label, Conflict, ConflictType, CspLevel, DataKind, FacetSnapshot, Severity, SourceValue};
use serde_json::json;

pub struct CspPricingRule;

impl DetectionRule for CspPricingRule {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::CspPricingMismatch
    }

    fn detect(
        &self,
        facets: &FacetSnapshot,
        ctx: &DetectionContext,
    ) -> Result<Vec<Conflict>, InputGap> {
        let demographics = require(facets.demographics.as_ref(), "demographics facet")?;
        let profile = require(demographics.csp_profile.as_ref(), "demographics.csp_profile")?;
        let level = require(profile.dominant_level(), "recognizable csp_profile.dominant")?;
        let listing = require(
            facets.first_listing(|l| l.price_level.is_some()),
            "listing with price_level",
        )?;
        let price_level = require(listing.price_level, "price_level")?;
        if !(1..=4).contains(&price_level) {
            return Err(InputGap::new(format!("price_level {} outside 1-4", price_level)));
        }
        let t = &ctx.thresholds;

        let demo_source = source_label(&demographics.source, "demographics");
        let listing_source = source_label(&listing.source, "listing");
        let sources = vec![
            SourceValue::new(demo_source, "csp_dominant", json!(level.as_str())),
            SourceValue::new(listing_source, "price_level", json!(price_level)),
        ];

        let (severity, description) = match level {
            CspLevel::High if price_level <= t.discount_price_level => (
                Severity::Medium,
                format!(
                    "Affluent catchment ({}) but {} lists price level {}; \
                     pricing sits below what the area can bear",
                    demo_source, listing_source, price_level
                ),
            ),
            CspLevel::Low if price_level >= t.luxury_price_level => (
                Severity::High,
                format!(
                    "Modest catchment ({}) but {} lists luxury price level {}; \
                     local purchasing power unlikely to sustain it",
                    demo_source, listing_source, price_level
                ),
            ),
            CspLevel::Low if price_level >= t.premium_price_level => (
                Severity::Medium,
                format!(
                    "Modest catchment ({}) but {} lists premium price level {}",
                    demo_source, listing_source, price_level
                ),
            ),
            _ => return Ok(Vec::new()),
        };

        Ok(vec![ctx.conflict(
            ConflictType::CspPricingMismatch,
            severity,
            DataKind::Pricing,
            sources,
            description,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::tests::test_context;
    use crate::types::{CspProfile, DemographicSnapshot, ReputationSnapshot};

    fn facets(dominant: &str, price_level: Option<u8>) -> FacetSnapshot {
        FacetSnapshot {
            demographics: Some(DemographicSnapshot {
                source: "INSEE".to_string(),
                csp_profile: Some(CspProfile {
                    dominant: Some(dominant.to_string()),
                    high_share: None,
                }),
                ..Default::default()
            }),
            reputation: vec![ReputationSnapshot {
                source: "Google Places".to_string(),
                price_level,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_affluent_discount_is_medium_opportunity() {
        let conflicts = CspPricingRule.detect(&facets("high", Some(1)), &test_context()).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, Severity::Medium);
        assert_eq!(conflicts[0].value_of("csp_dominant").unwrap(), "high");
    }

    #[test]
    fn test_modest_luxury_is_high_risk() {
        let conflicts = CspPricingRule.detect(&facets("low", Some(4)), &test_context()).unwrap();
        assert_eq!(conflicts[0].severity, Severity::High);
    }

    #[test]
    fn test_modest_premium_is_medium_risk() {
        let conflicts = CspPricingRule.detect(&facets("low", Some(3)), &test_context()).unwrap();
        assert_eq!(conflicts[0].severity, Severity::Medium);
    }

    #[test]
    fn test_aligned_profile_has_no_conflict() {
        assert!(CspPricingRule.detect(&facets("high", Some(3)), &test_context()).unwrap().is_empty());
        assert!(CspPricingRule.detect(&facets("medium", Some(1)), &test_context()).unwrap().is_empty());
    }

    #[test]
    fn test_bad_inputs_are_gaps() {
        assert!(CspPricingRule.detect(&facets("unknown", Some(1)), &test_context()).is_err());
        assert!(CspPricingRule.detect(&facets("high", None), &test_context()).is_err());
        assert!(CspPricingRule.detect(&facets("high", Some(9)), &test_context()).is_err());
    }
}
