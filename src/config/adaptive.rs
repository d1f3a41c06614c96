use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the adaptive controller and the pattern detector it
/// shares a lock with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct AdaptiveConfig {
    /// Minimum elapsed time between two tuning evaluations.
    #[serde(default = "default_learning_window_secs")]
    pub learning_window_secs: u64,

    /// Minimum number of lookups observed since the last evaluation before
    /// a tuning pass will act on the hit rate.
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    /// Reserved for a future weighted decision function; the current
    /// controller only compares against the two thresholds below.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,

    #[serde(default = "default_high_hit_threshold")]
    pub high_hit_threshold: f64,

    #[serde(default = "default_low_hit_threshold")]
    pub low_hit_threshold: f64,

    #[serde(default = "default_true")]
    pub enable_pattern_detection: bool,

    #[serde(default = "default_true")]
    pub enable_auto_tuning: bool,

    #[serde(default = "default_tuning_interval_secs")]
    pub tuning_interval_secs: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            learning_window_secs: default_learning_window_secs(),
            min_samples: default_min_samples(),
            sensitivity: default_sensitivity(),
            high_hit_threshold: default_high_hit_threshold(),
            low_hit_threshold: default_low_hit_threshold(),
            enable_pattern_detection: default_true(),
            enable_auto_tuning: default_true(),
            tuning_interval_secs: default_tuning_interval_secs(),
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.high_hit_threshold) {
            return Err(ConfigError::Validation(
                "adaptive_config.high_hit_threshold must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.low_hit_threshold) {
            return Err(ConfigError::Validation(
                "adaptive_config.low_hit_threshold must be in [0, 1]".into(),
            ));
        }
        if self.low_hit_threshold >= self.high_hit_threshold {
            return Err(ConfigError::Validation(
                "adaptive_config.low_hit_threshold must be less than high_hit_threshold".into(),
            ));
        }
        Ok(())
    }

    pub fn learning_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.learning_window_secs as i64)
    }

    pub fn tuning_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tuning_interval_secs)
    }
}

fn default_learning_window_secs() -> u64 {
    60
}

fn default_min_samples() -> u64 {
    100
}

fn default_sensitivity() -> f64 {
    0.5
}

fn default_high_hit_threshold() -> f64 {
    0.7
}

fn default_low_hit_threshold() -> f64 {
    0.2
}

fn default_tuning_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}
