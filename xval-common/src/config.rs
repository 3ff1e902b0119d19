//! Configuration loading and resolution
//!
//! All engine thresholds and penalty weights are empirically chosen business
//! constants. They live here as named, overridable values; the compiled
//! defaults are the reference values.
//!
//! # Resolution priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`XVAL_CONFIG`)
//! 3. User config file (`~/.config/xval/<module>.toml`)
//! 4. Compiled defaults
//!
//! A missing config file is never fatal: a warning is logged and the compiled
//! defaults are used. A file that exists but cannot be parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "XVAL_CONFIG";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Coherence score penalties
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Conflict detection thresholds
    #[serde(default)]
    pub detection: DetectionThresholds,

    /// Source prioritization gaps
    #[serde(default)]
    pub prioritization: PrioritizationConfig,

    /// Arbitration decision thresholds
    #[serde(default)]
    pub arbitration: ArbitrationThresholds,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Penalty model of the coherence scorer (points out of 100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub penalty_low: f64,
    pub penalty_medium: f64,
    pub penalty_high: f64,
    pub penalty_critical: f64,
    /// Hard ceiling applied to a score as soon as one critical conflict is present
    pub critical_cap: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            penalty_low: 5.0,
            penalty_medium: 10.0,
            penalty_high: 20.0,
            penalty_critical: 30.0,
            critical_cap: 40.0,
        }
    }
}

/// Thresholds used by the conflict detection rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionThresholds {
    /// Population at or above which zero nearby POIs is suspicious
    pub population_floor: u64,
    /// Population below which a dense POI count reads as a commercial district
    pub sparse_population_ceiling: u64,
    /// POI count at or above which a sparse zone is a commercial district
    pub commercial_poi_floor: u32,

    /// Price level treated as deep discount
    pub discount_price_level: u8,
    /// Price level treated as premium
    pub premium_price_level: u8,
    /// Price level treated as luxury (escalates the risk signal)
    pub luxury_price_level: u8,

    /// Listing rating (0-5) considered high
    pub high_rating_floor: f64,
    /// Listing rating (0-5) considered low
    pub low_rating_ceiling: f64,
    /// Visual condition score (0-10) considered poor
    pub poor_condition_ceiling: f64,
    /// Visual condition score (0-10) considered good
    pub good_condition_floor: f64,
    /// Minimum review count for a rating to count as strong evidence
    pub min_review_count: u64,

    /// Distance (m) at or below which geocoders agree
    pub geo_agreement_m: f64,
    /// Distance (m) above which the advisory mismatch becomes medium
    pub geo_medium_m: f64,
    /// Distance (m) above which one geocoder is matched to the wrong place
    pub geo_critical_m: f64,

    /// Score gap (points) for a low severity score mismatch
    pub score_gap_low: f64,
    /// Score gap (points) for a medium severity score mismatch
    pub score_gap_medium: f64,
    /// Score gap (points) for a high severity score mismatch
    pub score_gap_high: f64,

    /// max/min ratio for a low severity data inconsistency
    pub ratio_low: f64,
    /// max/min ratio for a medium severity data inconsistency
    pub ratio_medium: f64,
    /// max/min ratio for a high severity data inconsistency
    pub ratio_high: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            population_floor: 3000,
            sparse_population_ceiling: 500,
            commercial_poi_floor: 20,
            discount_price_level: 1,
            premium_price_level: 3,
            luxury_price_level: 4,
            high_rating_floor: 4.2,
            low_rating_ceiling: 2.5,
            poor_condition_ceiling: 4.0,
            good_condition_floor: 7.0,
            min_review_count: 10,
            geo_agreement_m: 100.0,
            geo_medium_m: 150.0,
            geo_critical_m: 200.0,
            score_gap_low: 25.0,
            score_gap_medium: 35.0,
            score_gap_high: 50.0,
            ratio_low: 1.25,
            ratio_medium: 1.5,
            ratio_high: 3.0,
        }
    }
}

/// Reliability gaps used by the source prioritizer (points out of 100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrioritizationConfig {
    /// Gap above which the top-ranked source is preferred outright
    pub prefer_gap: f64,
    /// Gap below which sources are treated as equally reliable
    pub hybrid_gap: f64,
}

impl Default for PrioritizationConfig {
    fn default() -> Self {
        Self {
            prefer_gap: 20.0,
            hybrid_gap: 10.0,
        }
    }
}

/// Thresholds used by the arbitration policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrationThresholds {
    /// Score gap below which a score mismatch is immaterial
    pub score_materiality_gap: f64,
    /// Score gap at or above which an unpreferred mismatch needs revalidation
    pub score_revalidation_gap: f64,
    /// Confidence of the needs-revalidation fallback
    pub fallback_confidence: f64,
}

impl Default for ArbitrationThresholds {
    fn default() -> Self {
        Self {
            score_materiality_gap: 30.0,
            score_revalidation_gap: 50.0,
            fallback_confidence: 0.4,
        }
    }
}

/// Resolves which config file to load and loads it
pub struct ConfigResolver {
    module_name: String,
}

impl ConfigResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// Pick the config file path by priority (CLI > ENV > user config dir)
    ///
    /// Returns None when no candidate is available at all.
    pub fn config_path(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        dirs::config_dir().map(|d| d.join("xval").join(format!("{}.toml", self.module_name)))
    }

    /// Resolve and load the configuration
    ///
    /// Missing files degrade to compiled defaults with a warning.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Result<TomlConfig> {
        let Some(path) = self.config_path(cli_arg) else {
            warn!("No configuration directory available, using compiled defaults");
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            return Ok(TomlConfig::default());
        }

        let config = load_toml_config(&path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write a config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scoring.penalty_high, 20.0);
        assert_eq!(config.scoring.penalty_medium, 10.0);
        assert_eq!(config.scoring.penalty_low, 5.0);
        assert_eq!(config.detection.population_floor, 3000);
        assert_eq!(config.detection.geo_agreement_m, 100.0);
        assert_eq!(config.detection.geo_critical_m, 200.0);
        assert_eq!(config.prioritization.prefer_gap, 20.0);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let toml_str = r#"
            [detection]
            population_floor = 5000

            [scoring]
            penalty_high = 25.0
        "#;
        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.detection.population_floor, 5000);
        assert_eq!(config.detection.commercial_poi_floor, 20);
        assert_eq!(config.scoring.penalty_high, 25.0);
        assert_eq!(config.scoring.penalty_medium, 10.0);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_cli_path_takes_priority() {
        let resolver = ConfigResolver::new("xval-arbiter");
        let path = resolver.config_path(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }
}
