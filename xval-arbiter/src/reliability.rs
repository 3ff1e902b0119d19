//! Source Reliability Table
//!
//! Static, versioned knowledge base mapping (source, data kind) to a
//! reliability score (0-100) and its rationale. This is the single place
//! reliability assumptions are declared; nothing is learned at runtime.
//!
//! Source names are matched case-insensitively, ignoring spaces, hyphens and
//! underscores ("Google Places" == "google_places").

use crate::types::DataKind;
use serde::Serialize;

/// Version of the declared reliability assumptions
pub const RELIABILITY_TABLE_VERSION: &str = "2024.2";

/// Score assigned to (source, kind) pairs with no declared entry
pub const NEUTRAL_RELIABILITY: f64 = 50.0;

/// One declared reliability assumption
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReliabilityEntry {
    pub source: &'static str,
    pub kind: DataKind,
    pub score: f64,
    pub rationale: &'static str,
}

/// Result of a table lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReliability {
    pub score: f64,
    pub rationale: String,
    /// False when the neutral default was used
    pub declared: bool,
}

const fn entry(
    source: &'static str,
    kind: DataKind,
    score: f64,
    rationale: &'static str,
) -> ReliabilityEntry {
    ReliabilityEntry {
        source,
        kind,
        score,
        rationale,
    }
}

static TABLE: &[ReliabilityEntry] = &[
    // Official statistics
    entry("INSEE", DataKind::Population, 95.0, "Official census counts for the administrative zone"),
    entry("INSEE", DataKind::Income, 92.0, "Official fiscal income statistics"),
    entry("INSEE", DataKind::SocioEconomicProfile, 90.0, "Official socio-professional category breakdown"),
    entry("INSEE", DataKind::PoiDensity, 60.0, "Business registry counts lag openings and closures"),
    // Points of interest and listings
    entry("OpenStreetMap", DataKind::PoiDensity, 70.0, "Crowd-sourced, uneven coverage outside dense areas"),
    entry("OpenStreetMap", DataKind::Location, 65.0, "Community-placed nodes, variable precision"),
    entry("Google Places", DataKind::PoiDensity, 85.0, "Broad commercial coverage, frequently refreshed"),
    entry("Google Places", DataKind::Rating, 80.0, "Large review base, moderate manipulation risk"),
    entry("Google Places", DataKind::ReviewCount, 90.0, "Counts reported directly by the platform"),
    entry("Google Places", DataKind::Pricing, 75.0, "Price tier partly inferred from user input"),
    entry("Google Places", DataKind::Location, 85.0, "Merchant-verified pins for most listings"),
    entry("TripAdvisor", DataKind::Rating, 75.0, "Tourism-skewed reviewer population"),
    entry("TripAdvisor", DataKind::ReviewCount, 70.0, "Counts include archived reviews"),
    entry("TripAdvisor", DataKind::Pricing, 65.0, "Coarse price bands"),
    entry("Pages Jaunes", DataKind::Location, 70.0, "Registered business address, no pin verification"),
    entry("Pages Jaunes", DataKind::PoiDensity, 60.0, "Directory coverage limited to paying listings"),
    entry("Pages Jaunes", DataKind::Rating, 55.0, "Small review base"),
    // Imagery
    entry("Vision", DataKind::VisualCondition, 80.0, "Direct inspection of recent imagery"),
    entry("Street View", DataKind::VisualCondition, 70.0, "Imagery may be several years old"),
    // Geocoders
    entry("BAN", DataKind::Location, 95.0, "National address base, rooftop precision"),
    entry("Nominatim", DataKind::Location, 60.0, "Street-level interpolation for many addresses"),
    // Unstructured web search
    entry("Web Search", DataKind::Population, 35.0, "Unverified figures, often outdated"),
    entry("Web Search", DataKind::Rating, 40.0, "Aggregated snippets without provenance"),
    entry("Web Search", DataKind::ReviewCount, 35.0, "Aggregated snippets without provenance"),
    entry("Web Search", DataKind::Pricing, 45.0, "Menu and price mentions of unknown date"),
    // Internal scoring agents
    entry("Demographic Agent", DataKind::OverallScore, 70.0, "Driven by official statistics"),
    entry("Local Market Agent", DataKind::OverallScore, 75.0, "Combines POI density and competition"),
    entry("Reputation Agent", DataKind::OverallScore, 65.0, "Depends on listing match quality"),
    entry("Visual Agent", DataKind::OverallScore, 60.0, "Single-image assessments"),
];

/// All declared entries
pub fn entries() -> &'static [ReliabilityEntry] {
    TABLE
}

/// Normalized source key used for matching
pub fn normalize_source(source: &str) -> String {
    source
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Look up the reliability of `source` for `kind`
///
/// Undeclared pairs get `NEUTRAL_RELIABILITY` with an explicit rationale.
pub fn lookup(source: &str, kind: DataKind) -> SourceReliability {
    let key = normalize_source(source);
    match TABLE
        .iter()
        .find(|e| e.kind == kind && normalize_source(e.source) == key)
    {
        Some(e) => SourceReliability {
            score: e.score,
            rationale: e.rationale.to_string(),
            declared: true,
        },
        None => SourceReliability {
            score: NEUTRAL_RELIABILITY,
            rationale: format!("No declared reliability for {} on {}", source, kind),
            declared: false,
        },
    }
}
