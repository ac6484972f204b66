//! Typed, validated configuration.
//!
//! Replaces the source's process-wide `ConfigManager` singleton with an immutable value constructed once and
//! passed explicitly to every component that needs it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Adaptive per-script thresholds for short names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveThresholdConfig {
    pub enabled: bool,
    pub chinese: i32,
    pub arabic: i32,
    pub cyrillic: i32,
    pub latin_initials: i32,
}

impl Default for AdaptiveThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chinese: 85,
            arabic: 90,
            cyrillic: 90,
            latin_initials: 98,
        }
    }
}

/// Match-layer boundary scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerThresholds {
    pub exact_match: i32,
    pub high_confidence: i32,
    pub moderate_match: i32,
    pub low_match: i32,
}

impl Default for LayerThresholds {
    fn default() -> Self {
        Self {
            exact_match: 100,
            high_confidence: 85,
            moderate_match: 70,
            low_match: 60,
        }
    }
}

/// Scoring-dimension weights. Nationality and address are
/// carried but intentionally excluded from the overall sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    pub name: f64,
    pub document: f64,
    pub dob: f64,
    pub nationality: f64,
    pub address: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            name: 0.40,
            document: 0.30,
            dob: 0.15,
            nationality: 0.10,
            address: 0.05,
        }
    }
}

/// MatchingEngine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub name_threshold: i32,
    pub short_name_threshold: i32,
    pub common_names: Vec<String>,
    pub weights: MatchWeights,
    pub layers: LayerThresholds,
    pub adaptive_thresholds: AdaptiveThresholdConfig,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            name_threshold: 85,
            short_name_threshold: 95,
            common_names: Vec::new(),
            weights: MatchWeights::default(),
            layers: LayerThresholds::default(),
            adaptive_thresholds: AdaptiveThresholdConfig::default(),
        }
    }
}

/// InputValidator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputValidationConfig {
    pub name_min_length: usize,
    pub name_max_length: usize,
    pub document_max_length: usize,
    pub allow_unicode_names: bool,
    pub blocked_characters: String,
}

impl Default for InputValidationConfig {
    fn default() -> Self {
        Self {
            name_min_length: 2,
            name_max_length: 200,
            document_max_length: 50,
            allow_unicode_names: true,
            blocked_characters: "<>{}[]|\\;`$".to_string(),
        }
    }
}

/// Optional `known_hashes.json`-shaped integrity side-channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashVerificationConfig {
    pub enabled: bool,
    pub known_hashes_file: String,
    pub max_retry_attempts: u32,
    pub alert_on_mismatch: bool,
}

impl Default for HashVerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            known_hashes_file: "known_hashes.json".to_string(),
            max_retry_attempts: 3,
            alert_on_mismatch: true,
        }
    }
}

/// Fetcher/Parser/Validator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub ofac_url: String,
    pub un_url: String,
    pub update_frequency_days: u32,
    /// Carried for configuration-surface parity with the source; the
    /// core performs no XSD validation itself (an external collaborator's
    /// concern).
    pub xsd_validation: bool,
    pub xsd_strictness: String,
    pub data_directory: String,
    pub entity_count_variance_threshold: f64,
    pub malformed_entity_threshold: f64,
    pub hash_verification: HashVerificationConfig,
    pub fetch_timeout_seconds: u64,
    pub fetch_chunk_size_bytes: usize,
    pub max_file_size_bytes: u64,
    pub max_entity_count_multiplier: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ofac_url:
                "https://sanctionslistservice.ofac.treas.gov/api/PublicationPreview/exports/SDN_ENHANCED.ZIP"
                    .to_string(),
            un_url: "https://scsanctions.un.org/resources/xml/en/consolidated.xml".to_string(),
            update_frequency_days: 7,
            xsd_validation: true,
            xsd_strictness: "normal".to_string(),
            data_directory: "sanctions_data".to_string(),
            entity_count_variance_threshold: 0.5,
            malformed_entity_threshold: 1.0,
            hash_verification: HashVerificationConfig::default(),
            fetch_timeout_seconds: 120,
            fetch_chunk_size_bytes: 8192,
            max_file_size_bytes: 1024 * 1024 * 1024,
            max_entity_count_multiplier: 2.0,
        }
    }
}

/// Recommendation-threshold and report-shaping configuration.
/// The reporting collaborator is out of scope; these fields
/// exist purely as part of the configuration surface the core validates
/// and an external reporting layer would consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub include_low_confidence: bool,
    pub minimum_report_score: i32,
    pub auto_clear: i32,
    pub manual_review: i32,
    pub auto_escalate: i32,
    pub output_directory: String,
    pub include_audit_trail: bool,
    pub data_freshness_warning_days: u32,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            include_low_confidence: false,
            minimum_report_score: 60,
            auto_clear: 60,
            manual_review: 85,
            auto_escalate: 95,
            output_directory: "reports".to_string(),
            include_audit_trail: true,
            data_freshness_warning_days: 7,
        }
    }
}

/// Resource-bound configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub memory_limit_gb: u32,
    pub concurrent_searches: bool,
    pub max_threads: usize,
    pub batch_size: usize,
    pub max_recent_screenings: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            memory_limit_gb: 2,
            concurrent_searches: true,
            max_threads: 4,
            batch_size: 100,
            max_recent_screenings: 10_000,
        }
    }
}

/// Required field sets for post-parse validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub required_entity_fields: Vec<String>,
    pub required_individual_fields: Vec<String>,
    pub log_validation_errors: bool,
    pub abort_on_high_malformation: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            required_entity_fields: vec!["id".into(), "name".into(), "source".into()],
            required_individual_fields: vec![
                "id".into(),
                "name".into(),
                "source".into(),
                "type".into(),
            ],
            log_validation_errors: true,
            abort_on_high_malformation: true,
        }
    }
}

/// Algorithm identity echoed in every `ScreeningResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmConfig {
    pub version: String,
    pub name: String,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            version: "2.0.0".to_string(),
            name: "Multi-Layer Fuzzy Matcher".to_string(),
        }
    }
}

/// The top-level immutable configuration value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub matching: MatchingConfig,
    pub input_validation: InputValidationConfig,
    pub data: DataConfig,
    pub reporting: ReportingConfig,
    pub performance: PerformanceConfig,
    pub validation: ValidationConfig,
    pub algorithm: AlgorithmConfig,
    /// Unrecognized keys encountered while loading, kept so the host can
    /// log a warning ("extra keys are ignored") without the core needing
    /// to know what they mean.
    #[serde(flatten)]
    pub unknown: HashMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            input_validation: InputValidationConfig::default(),
            data: DataConfig::default(),
            reporting: ReportingConfig::default(),
            performance: PerformanceConfig::default(),
            validation: ValidationConfig::default(),
            algorithm: AlgorithmConfig::default(),
            unknown: HashMap::new(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("matching.name_threshold and matching.short_name_threshold must be in [0, 100]")]
    ThresholdOutOfRange,
    #[error(
        "reporting thresholds must be strictly ascending: auto_clear < manual_review < auto_escalate"
    )]
    RecommendationThresholdsNotAscending,
    #[error("input_validation: 0 < name_min_length <= name_max_length <= 1000 must hold")]
    NameLengthBoundsInvalid,
    #[error("input_validation.document_max_length must be > 0")]
    DocumentMaxLengthInvalid,
}

impl Config {
    /// Enforces cross-field invariants the source's `ConfigManager._validate`
    /// only documented but never actually checked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.matching;
        if !(0..=100).contains(&m.name_threshold) || !(0..=100).contains(&m.short_name_threshold) {
            return Err(ConfigError::ThresholdOutOfRange);
        }

        let r = &self.reporting;
        if !(r.auto_clear < r.manual_review && r.manual_review < r.auto_escalate) {
            return Err(ConfigError::RecommendationThresholdsNotAscending);
        }

        let v = &self.input_validation;
        if !(v.name_min_length > 0
            && v.name_min_length <= v.name_max_length
            && v.name_max_length <= 1000)
        {
            return Err(ConfigError::NameLengthBoundsInvalid);
        }
        if v.document_max_length == 0 {
            return Err(ConfigError::DocumentMaxLengthInvalid);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut c = Config::default();
        c.matching.name_threshold = 150;
        assert_eq!(c.validate(), Err(ConfigError::ThresholdOutOfRange));
    }

    #[test]
    fn rejects_non_ascending_recommendation_thresholds() {
        let mut c = Config::default();
        c.reporting.manual_review = 50;
        c.reporting.auto_clear = 60;
        assert_eq!(
            c.validate(),
            Err(ConfigError::RecommendationThresholdsNotAscending)
        );
    }

    #[test]
    fn rejects_inverted_name_length_bounds() {
        let mut c = Config::default();
        c.input_validation.name_min_length = 300;
        c.input_validation.name_max_length = 200;
        assert_eq!(c.validate(), Err(ConfigError::NameLengthBoundsInvalid));
    }

    #[test]
    fn rejects_zero_document_max_length() {
        let mut c = Config::default();
        c.input_validation.document_max_length = 0;
        assert_eq!(c.validate(), Err(ConfigError::DocumentMaxLengthInvalid));
    }

    #[test]
    fn deserializes_with_unknown_keys_ignored_not_rejected() {
        let json = serde_json::json!({
            "matching": { "name_threshold": 80 },
            "some_future_option": true
        });
        let c: Config = serde_json::from_value(json).unwrap();
        assert_eq!(c.matching.name_threshold, 80);
        assert!(c.unknown.contains_key("some_future_option"));
    }
}
