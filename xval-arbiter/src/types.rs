//! Core Types for XVAL Arbiter
//!
//! Defines the data contracts between the engine stages:
//! - **Input:** `FacetSnapshot` (immutable facet records from upstream agents)
//! - **Detection:** `Conflict` (one detected disagreement)
//! - **Arbitration:** `Resolution` (outcome for exactly one conflict)
//! - **Scoring:** `CoherenceScore`
//!
//! Every facet and every field inside a facet is optional: upstream producers
//! fail or return partial data, and the engine works on whatever is present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Confidence score (0.0-1.0)
pub type Confidence = f64;

// ============================================================================
// Facet Records (upstream input)
// ============================================================================

/// All facet records produced for one entity in one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetSnapshot {
    /// Identifier of the analysed entity (site, business)
    pub entity_id: String,
    pub demographics: Option<DemographicSnapshot>,
    pub competition: Option<CompetitorSnapshot>,
    pub condition: Option<ConditionSnapshot>,
    /// One entry per listing source (ordered by the producer)
    pub reputation: Vec<ReputationSnapshot>,
    /// One entry per geocoder
    pub geocoding: Vec<GeocodedPosition>,
    /// Facet-level scores emitted by the analysis agents
    pub scores: Vec<ScoreAssessment>,
    /// Additional numeric facts reported by more than one source
    pub observations: Vec<Observation>,
}

/// Demographic snapshot of the entity's catchment area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicSnapshot {
    pub source: String,
    pub population: Option<u64>,
    pub density_per_km2: Option<f64>,
    pub median_income: Option<f64>,
    pub csp_profile: Option<CspProfile>,
}

/// Socio-professional profile of the resident population
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CspProfile {
    /// Dominant profile as reported ("high", "medium", "low")
    pub dominant: Option<String>,
    /// Share of high socio-professional categories (0.0-1.0)
    pub high_share: Option<f64>,
}

impl CspProfile {
    /// Parsed dominant level, None when absent or unrecognized
    pub fn dominant_level(&self) -> Option<CspLevel> {
        self.dominant.as_deref().and_then(CspLevel::parse)
    }
}

/// Dominant socio-professional level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CspLevel {
    High,
    Medium,
    Low,
}

impl CspLevel {
    /// Case-insensitive parse of a producer-supplied label
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "upper" | "affluent" => Some(Self::High),
            "medium" | "middle" | "mid" => Some(Self::Medium),
            "low" | "modest" | "lower" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Competitor / point-of-interest snapshot around the entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorSnapshot {
    pub source: String,
    /// Points of interest found within the search radius
    pub poi_count: Option<u32>,
    pub search_radius_m: Option<f64>,
    pub competitor_count: Option<u32>,
}

/// Imagery-derived physical condition snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSnapshot {
    pub source: String,
    /// Overall visual condition (0-10)
    pub condition_score: Option<f64>,
    /// Facade condition (0-10)
    pub facade_score: Option<f64>,
    /// Producer's own confidence in the assessment (0.0-1.0)
    pub confidence: Option<Confidence>,
}

/// Third-party reputation / listing snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationSnapshot {
    pub source: String,
    /// Average rating (0-5)
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    /// Pricing tier, 1 (lowest) to 4 (premium)
    pub price_level: Option<u8>,
    pub listing_name: Option<String>,
}

/// One geocoder's position for the entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodedPosition {
    pub source: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub label: Option<String>,
}

impl GeocodedPosition {
    /// Latitude/longitude when both are present and within WGS84 bounds
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.latitude.filter(|v| v.is_finite() && (-90.0..=90.0).contains(v))?;
        let lon = self.longitude.filter(|v| v.is_finite() && (-180.0..=180.0).contains(v))?;
        Some((lat, lon))
    }
}

/// A facet-level score (0-100) emitted by an analysis agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreAssessment {
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_score_dimension")]
    pub dimension: DataKind,
    #[serde(default)]
    pub score: Option<f64>,
}

fn default_score_dimension() -> DataKind {
    DataKind::OverallScore
}

/// A generic numeric fact asserted by one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default)]
    pub source: String,
    /// Observations without a kind cannot be compared and are skipped
    #[serde(default)]
    pub kind: Option<DataKind>,
    #[serde(default)]
    pub value: Option<f64>,
    /// Engagement count backing the value (reviews, samples)
    #[serde(default)]
    pub sample_size: Option<u64>,
}

impl FacetSnapshot {
    /// True when at least one facet is present
    pub fn has_any_facet(&self) -> bool {
        self.demographics.is_some()
            || self.competition.is_some()
            || self.condition.is_some()
            || !self.reputation.is_empty()
            || !self.geocoding.is_empty()
            || !self.scores.is_empty()
            || !self.observations.is_empty()
    }

    /// First listing (in producer order) carrying the requested field
    pub fn first_listing<F>(&self, has_field: F) -> Option<&ReputationSnapshot>
    where
        F: Fn(&ReputationSnapshot) -> bool,
    {
        self.reputation.iter().find(|listing| has_field(listing))
    }

    /// Numeric observations grouped by data kind
    ///
    /// Merges explicit observations with the facts the typed facets already
    /// carry (population, income, POI count, listing rating), so two listings
    /// disagreeing on a rating are comparable without extra input. A listing's
    /// review count only backs its rating as engagement: counts from different
    /// platforms measure different audiences. Non-finite values and kind-less
    /// observations are dropped.
    pub fn observations_by_kind(&self) -> BTreeMap<DataKind, Vec<Observation>> {
        let mut grouped: BTreeMap<DataKind, Vec<Observation>> = BTreeMap::new();
        let mut push = |source: &str, kind: DataKind, value: Option<f64>, sample_size: Option<u64>| {
            if let Some(value) = value.filter(|v| v.is_finite()) {
                grouped.entry(kind).or_default().push(Observation {
                    source: source.to_string(),
                    kind: Some(kind),
                    value: Some(value),
                    sample_size,
                });
            }
        };

        if let Some(demo) = &self.demographics {
            let source = source_label(&demo.source, "demographics");
            push(source, DataKind::Population, demo.population.map(|p| p as f64), None);
            push(source, DataKind::Income, demo.median_income, None);
        }

        if let Some(comp) = &self.competition {
            let source = source_label(&comp.source, "competition");
            push(source, DataKind::PoiDensity, comp.poi_count.map(f64::from), None);
        }

        for listing in &self.reputation {
            let source = source_label(&listing.source, "listing");
            push(source, DataKind::Rating, listing.rating, listing.review_count);
        }

        for observation in &self.observations {
            let Some(kind) = observation.kind else {
                continue;
            };
            push(
                source_label(&observation.source, "observation"),
                kind,
                observation.value,
                observation.sample_size,
            );
        }

        grouped
    }
}

/// Producer name, or a facet-derived placeholder when the producer left it blank
pub fn source_label<'a>(source: &'a str, fallback: &'a str) -> &'a str {
    if source.trim().is_empty() {
        fallback
    } else {
        source
    }
}

// ============================================================================
// Taxonomy
// ============================================================================

/// What a disputed value is about
///
/// Used both to pick the relevant reliability entry for a source and to map a
/// conflict into a coherence category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Population,
    PoiDensity,
    SocioEconomicProfile,
    Income,
    Pricing,
    Rating,
    ReviewCount,
    VisualCondition,
    Location,
    OverallScore,
}

impl DataKind {
    pub const ALL: [DataKind; 10] = [
        DataKind::Population,
        DataKind::PoiDensity,
        DataKind::SocioEconomicProfile,
        DataKind::Income,
        DataKind::Pricing,
        DataKind::Rating,
        DataKind::ReviewCount,
        DataKind::VisualCondition,
        DataKind::Location,
        DataKind::OverallScore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::PoiDensity => "poi_density",
            Self::SocioEconomicProfile => "socio_economic_profile",
            Self::Income => "income",
            Self::Pricing => "pricing",
            Self::Rating => "rating",
            Self::ReviewCount => "review_count",
            Self::VisualCondition => "visual_condition",
            Self::Location => "location",
            Self::OverallScore => "overall_score",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == label)
    }

    /// Coherence category the kind contributes to
    pub fn category(self) -> CoherenceCategory {
        match self {
            Self::Population | Self::PoiDensity | Self::SocioEconomicProfile | Self::Income => {
                CoherenceCategory::Demographic
            }
            Self::VisualCondition => CoherenceCategory::Physical,
            Self::Pricing | Self::Rating | Self::ReviewCount | Self::OverallScore => {
                CoherenceCategory::Reputation
            }
            Self::Location => CoherenceCategory::Geographic,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coherence sub-score categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoherenceCategory {
    Demographic,
    Physical,
    Reputation,
    Geographic,
}

impl CoherenceCategory {
    pub const ALL: [CoherenceCategory; 4] = [
        CoherenceCategory::Demographic,
        CoherenceCategory::Physical,
        CoherenceCategory::Reputation,
        CoherenceCategory::Geographic,
    ];
}

/// Closed set of conflict kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    PopulationPoiMismatch,
    CspPricingMismatch,
    ReputationConditionMismatch,
    DataInconsistency,
    ScoreMismatch,
    GeographicMismatch,
}

impl ConflictType {
    pub const ALL: [ConflictType; 6] = [
        ConflictType::PopulationPoiMismatch,
        ConflictType::CspPricingMismatch,
        ConflictType::ReputationConditionMismatch,
        ConflictType::DataInconsistency,
        ConflictType::ScoreMismatch,
        ConflictType::GeographicMismatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PopulationPoiMismatch => "POPULATION_POI_MISMATCH",
            Self::CspPricingMismatch => "CSP_PRICING_MISMATCH",
            Self::ReputationConditionMismatch => "REPUTATION_CONDITION_MISMATCH",
            Self::DataInconsistency => "DATA_INCONSISTENCY",
            Self::ScoreMismatch => "SCORE_MISMATCH",
            Self::GeographicMismatch => "GEOGRAPHIC_MISMATCH",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conflict severity, assigned by the detection rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight used when averaging resolution confidences
    pub fn weight(self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 3.0,
            Self::Critical => 4.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ============================================================================
// Conflict
// ============================================================================

/// Conflict identifier
///
/// UUID v5 over (run id, type, data kind, source values): the same inputs in
/// the same run always produce the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    pub fn derive(
        run_id: Uuid,
        conflict_type: ConflictType,
        data_kind: DataKind,
        sources: &[SourceValue],
    ) -> Self {
        let mut name = format!("{}|{}", conflict_type.as_str(), data_kind.as_str());
        for sv in sources {
            name.push('|');
            name.push_str(&sv.source);
            name.push(':');
            name.push_str(&sv.field);
            name.push('=');
            name.push_str(&sv.value.to_string());
        }
        Self(Uuid::new_v5(&run_id, name.as_bytes()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One source's assertion within a conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceValue {
    pub source: String,
    pub field: String,
    pub value: Value,
}

impl SourceValue {
    pub fn new(source: impl Into<String>, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            source: source.into(),
            field: field.into(),
            value: value.into(),
        }
    }
}

/// One detected disagreement between facets
///
/// Never mutated after detection. Arbitration produces a separate
/// `Resolution`; `into_resolved` yields the copy paired with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub data_kind: DataKind,
    /// Ordered source assertions
    pub sources: Vec<SourceValue>,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    pub resolved: bool,
}

impl Conflict {
    /// Distinct source names in assertion order
    pub fn source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for sv in &self.sources {
            if !names.contains(&sv.source.as_str()) {
                names.push(sv.source.as_str());
            }
        }
        names
    }

    /// First value asserted for `field`
    pub fn value_of(&self, field: &str) -> Option<&Value> {
        self.sources.iter().find(|sv| sv.field == field).map(|sv| &sv.value)
    }

    /// First numeric value asserted for `field`
    pub fn number(&self, field: &str) -> Option<f64> {
        self.value_of(field).and_then(Value::as_f64)
    }

    /// Numeric value asserted by `source` for `field`
    pub fn number_from(&self, source: &str, field: &str) -> Option<f64> {
        self.sources
            .iter()
            .find(|sv| sv.source == source && sv.field == field)
            .and_then(|sv| sv.value.as_f64())
    }

    /// All (source, number) pairs asserted for `field`
    pub fn numbers(&self, field: &str) -> Vec<(&str, f64)> {
        self.sources
            .iter()
            .filter(|sv| sv.field == field)
            .filter_map(|sv| sv.value.as_f64().map(|v| (sv.source.as_str(), v)))
            .collect()
    }

    /// Coherence categories this conflict is penalised in
    pub fn categories(&self) -> Vec<CoherenceCategory> {
        match self.conflict_type {
            ConflictType::ReputationConditionMismatch => {
                vec![CoherenceCategory::Physical, CoherenceCategory::Reputation]
            }
            ConflictType::GeographicMismatch => vec![CoherenceCategory::Geographic],
            _ => vec![self.data_kind.category()],
        }
    }

    /// Copy of this conflict carrying the given resolution state
    pub fn into_resolved(self, resolved: bool) -> Self {
        Self { resolved, ..self }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Arbitration outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionType {
    /// One source selected as ground truth
    Confirmed,
    /// One side invalidated outright and to be re-fetched upstream
    Rejected,
    /// Both sources correct, describing compatible aspects
    Hybrid,
    /// No authoritative source and the disagreement is material
    NeedsRevalidation,
    /// Below materiality for the consuming report
    Ignored,
}

impl fmt::Display for ResolutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Hybrid => write!(f, "HYBRID"),
            Self::NeedsRevalidation => write!(f, "NEEDS_REVALIDATION"),
            Self::Ignored => write!(f, "IGNORED"),
        }
    }
}

/// Arbitration result for exactly one conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub conflict_id: ConflictId,
    pub resolution_type: ResolutionType,
    pub confidence: Confidence,
    pub explanation: String,
    pub chosen_source: Option<String>,
    /// Patch to apply downstream (flags, corrected estimates)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub updated_data: BTreeMap<String, Value>,
    pub action_required: Option<String>,
}

impl Resolution {
    /// Create a resolution with confidence clamped to 0.0-1.0
    pub fn new(
        conflict_id: ConflictId,
        resolution_type: ResolutionType,
        confidence: Confidence,
        explanation: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            conflict_id,
            resolution_type,
            confidence,
            explanation: explanation.into(),
            chosen_source: None,
            updated_data: BTreeMap::new(),
            action_required: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.chosen_source = Some(source.into());
        self
    }

    pub fn with_patch(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.updated_data.insert(key.into(), value.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action_required = Some(action.into());
        self
    }

    /// True unless the conflict still needs upstream revalidation
    pub fn is_settled(&self) -> bool {
        self.resolution_type != ResolutionType::NeedsRevalidation
    }
}

// ============================================================================
// Coherence Score
// ============================================================================

/// Overall and per-category coherence (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceScore {
    pub overall: f64,
    pub demographic: f64,
    pub physical: f64,
    pub reputation: f64,
    pub geographic: f64,
}

impl CoherenceScore {
    pub fn category(&self, category: CoherenceCategory) -> f64 {
        match category {
            CoherenceCategory::Demographic => self.demographic,
            CoherenceCategory::Physical => self.physical,
            CoherenceCategory::Reputation => self.reputation,
            CoherenceCategory::Geographic => self.geographic,
        }
    }
}

impl Default for CoherenceScore {
    fn default() -> Self {
        Self {
            overall: 100.0,
            demographic: 100.0,
            physical: 100.0,
            reputation: 100.0,
            geographic: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_sources() -> Vec<SourceValue> {
        vec![
            SourceValue::new("INSEE", "population", json!(5000)),
            SourceValue::new("Google Places", "poi_count", json!(0)),
        ]
    }

    #[test]
    fn test_conflict_id_is_deterministic() {
        let run = Uuid::nil();
        let a = ConflictId::derive(run, ConflictType::PopulationPoiMismatch, DataKind::PoiDensity, &sample_sources());
        let b = ConflictId::derive(run, ConflictType::PopulationPoiMismatch, DataKind::PoiDensity, &sample_sources());
        assert_eq!(a, b);
    }

    #[test]
    fn test_conflict_id_depends_on_run_and_values() {
        let run = Uuid::nil();
        let base = ConflictId::derive(run, ConflictType::PopulationPoiMismatch, DataKind::PoiDensity, &sample_sources());

        let other_run = Uuid::new_v5(&Uuid::NAMESPACE_OID, b"other");
        let moved = ConflictId::derive(other_run, ConflictType::PopulationPoiMismatch, DataKind::PoiDensity, &sample_sources());
        assert_ne!(base, moved);

        let mut sources = sample_sources();
        sources[0].value = json!(5001);
        let changed = ConflictId::derive(run, ConflictType::PopulationPoiMismatch, DataKind::PoiDensity, &sources);
        assert_ne!(base, changed);
    }

    #[test]
    fn test_resolution_confidence_clamped() {
        let id = ConflictId::derive(Uuid::nil(), ConflictType::ScoreMismatch, DataKind::OverallScore, &[]);
        assert_eq!(Resolution::new(id, ResolutionType::Hybrid, 1.4, "x").confidence, 1.0);
        assert_eq!(Resolution::new(id, ResolutionType::Hybrid, -0.2, "x").confidence, 0.0);
        assert_eq!(Resolution::new(id, ResolutionType::Hybrid, f64::NAN, "x").confidence, 0.0);
    }

    #[test]
    fn test_csp_level_parse() {
        assert_eq!(CspLevel::parse("High"), Some(CspLevel::High));
        assert_eq!(CspLevel::parse(" modest "), Some(CspLevel::Low));
        assert_eq!(CspLevel::parse("unknown"), None);
    }

    #[test]
    fn test_observations_merge_facets_and_explicit() {
        let facets = FacetSnapshot {
            demographics: Some(DemographicSnapshot {
                source: "INSEE".to_string(),
                population: Some(5000),
                ..Default::default()
            }),
            reputation: vec![
                ReputationSnapshot {
                    source: "Google Places".to_string(),
                    rating: Some(4.5),
                    review_count: Some(120),
                    ..Default::default()
                },
                ReputationSnapshot {
                    source: "TripAdvisor".to_string(),
                    rating: Some(f64::NAN),
                    ..Default::default()
                },
            ],
            observations: vec![Observation {
                source: "Web Search".to_string(),
                kind: Some(DataKind::Population),
                value: Some(12000.0),
                sample_size: None,
            }],
            ..Default::default()
        };

        let grouped = facets.observations_by_kind();
        assert_eq!(grouped[&DataKind::Population].len(), 2);
        // NaN rating dropped
        assert_eq!(grouped[&DataKind::Rating].len(), 1);
        assert_eq!(grouped[&DataKind::Rating][0].sample_size, Some(120));
    }

    #[test]
    fn test_conflict_serializes_type_name() {
        let conflict = Conflict {
            id: ConflictId::derive(Uuid::nil(), ConflictType::GeographicMismatch, DataKind::Location, &[]),
            conflict_type: ConflictType::GeographicMismatch,
            severity: Severity::Critical,
            data_kind: DataKind::Location,
            sources: vec![],
            description: String::new(),
            detected_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            resolved: false,
        };
        let value = serde_json::to_value(&conflict).unwrap();
        assert_eq!(value["type"], "GEOGRAPHIC_MISMATCH");
        assert_eq!(value["severity"], "CRITICAL");
    }

    #[test]
    fn test_listing_review_counts_are_not_compared() {
        let facets = FacetSnapshot {
            reputation: vec![
                ReputationSnapshot {
                    source: "Google Places".to_string(),
                    rating: Some(4.5),
                    review_count: Some(120),
                    ..Default::default()
                },
                ReputationSnapshot {
                    source: "TripAdvisor".to_string(),
                    rating: Some(4.4),
                    review_count: Some(30),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let grouped = facets.observations_by_kind();
        assert!(!grouped.contains_key(&DataKind::ReviewCount));
        let engagement: Vec<_> = grouped[&DataKind::Rating].iter().map(|o| o.sample_size).collect();
        assert_eq!(engagement, vec![Some(120), Some(30)]);
    }

    #[test]
    fn test_observation_without_kind_is_skipped() {
        let facets: FacetSnapshot = serde_json::from_value(json!({
            "entity_id": "partial",
            "observations": [
                {"source": "Web Search", "value": 12000.0},
                {"source": "Web Search", "kind": "income", "value": 21000.0}
            ]
        }))
        .unwrap();

        assert_eq!(facets.observations[0].kind, None);
        let grouped = facets.observations_by_kind();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[&DataKind::Income].len(), 1);
    }

    #[test]
    fn test_empty_snapshot_deserializes() {
        let facets: FacetSnapshot = serde_json::from_str("{}").unwrap();
        assert!(!facets.has_any_facet());
    }
}
