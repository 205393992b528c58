//! Pipeline configuration.
//!
//! Every field has a default, so a JSON config file only needs the fields it
//! changes.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::types::KeySpec;
use crate::error::ConfigError;

/// What to do with rows that share a `(cd_key, ds)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Exclude every row of the pair and report it.
    #[default]
    Reject,
    Sum,
    Mean,
    /// Keep the value emitted last by the canonicalizer.
    Last,
}

/// Thresholds for wide/long detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeThresholds {
    /// Minimum share of date-like headers for a wide layout.
    pub header_fraction: f64,
    /// Minimum date-like headers for a wide layout.
    pub min_date_headers: usize,
    /// Minimum share of date values in one column for a long layout.
    pub value_fraction: f64,
}

impl Default for ShapeThresholds {
    fn default() -> Self {
        Self {
            header_fraction: 0.5,
            min_date_headers: 2,
            value_fraction: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    /// Minimum share of deltas the winning cadence must explain.
    pub threshold: f64,
    /// Gap multipliers must stay strictly below this.
    pub max_multiplier: u32,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            max_multiplier: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Below this shape confidence a caller-supplied mapping is required.
    pub confidence_floor: f64,
    pub shape: ShapeThresholds,
    pub frequency: FrequencyConfig,
    pub key_separator: String,
    pub null_token: String,
    pub duplicate_policy: DuplicatePolicy,
    /// Samples kept per diagnostic reason.
    pub diagnostic_sample_limit: usize,
    /// Non-null values inspected per column when classifying.
    pub classify_sample_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.6,
            shape: ShapeThresholds::default(),
            frequency: FrequencyConfig::default(),
            key_separator: "|".to_string(),
            null_token: String::new(),
            duplicate_policy: DuplicatePolicy::Reject,
            diagnostic_sample_limit: 20,
            classify_sample_limit: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn key_spec(&self) -> KeySpec {
        KeySpec {
            separator: self.key_separator.clone(),
            null_token: self.null_token.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            ("confidence_floor", self.confidence_floor),
            ("shape.header_fraction", self.shape.header_fraction),
            ("shape.value_fraction", self.shape.value_fraction),
            ("frequency.threshold", self.frequency.threshold),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::NotAFraction { field, value });
            }
        }
        let minimums = [
            ("frequency.max_multiplier", 2, self.frequency.max_multiplier as usize),
            ("classify_sample_limit", 1, self.classify_sample_limit),
        ];
        for (field, min, value) in minimums {
            if value < min {
                return Err(ConfigError::BelowMinimum { field, min, value });
            }
        }
        Ok(())
    }
}
