//! CSP vs. pricing arbitration
//!
//! Both sides are correct; the mismatch is a business signal. An affluent
//! catchment with discount pricing is a repositioning opportunity, a modest
//! catchment with premium pricing is a risk.

use super::ArbitrationPolicy;
use crate::prioritizer::SourcePriority;
use crate::types::{Conflict, ConflictType, CspLevel, Resolution, ResolutionType, Severity};
use xval_common::config::ArbitrationThresholds;

pub struct CspPricingPolicy;

impl ArbitrationPolicy for CspPricingPolicy {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::CspPricingMismatch
    }

    fn resolve(
        &self,
        conflict: &Conflict,
        _priority: &SourcePriority,
        _thresholds: &ArbitrationThresholds,
    ) -> Option<Resolution> {
        let level = conflict
            .value_of("csp_dominant")
            .and_then(|v| v.as_str())
            .and_then(CspLevel::parse)?;
        let price_level = conflict.number("price_level")?;

        match level {
            CspLevel::High => Some(
                Resolution::new(
                    conflict.id,
                    ResolutionType::Hybrid,
                    0.9,
                    format!(
                        "Affluent catchment with price level {:.0}: pricing leaves room to move upmarket",
                        price_level
                    ),
                )
                .with_patch("pricing_repositioning_opportunity", true),
            ),
            CspLevel::Low => {
                let confidence = if conflict.severity >= Severity::High { 0.8 } else { 0.85 };
                Some(
                    Resolution::new(
                        conflict.id,
                        ResolutionType::Hybrid,
                        confidence,
                        format!(
                            "Modest catchment with price level {:.0}: local demand may not sustain the pricing",
                            price_level
                        ),
                    )
                    .with_patch("pricing_risk", true)
                    .with_action("Review the pricing strategy against local purchasing power"),
                )
            }
            CspLevel::Medium => None,
        }
    }
}
