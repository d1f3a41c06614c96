use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the token (Jaccard + fuzzy Levenshtein) matching
/// strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    #[serde(default = "default_threshold")]
    pub token_similarity_threshold: f64,

    #[serde(default = "default_max_token_distance")]
    pub max_token_distance: usize,

    #[serde(default)]
    pub enable_fuzzy_matching: bool,

    #[serde(default = "default_true")]
    pub normalize_tokens: bool,

    #[serde(default = "default_true")]
    pub ignore_case: bool,

    #[serde(default = "default_true")]
    pub remove_punctuation: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_similarity_threshold: default_threshold(),
            max_token_distance: default_max_token_distance(),
            enable_fuzzy_matching: false,
            normalize_tokens: default_true(),
            ignore_case: default_true(),
            remove_punctuation: default_true(),
        }
    }
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.token_similarity_threshold) {
            return Err(ConfigError::Validation(
                "token_config.token_similarity_threshold must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

fn default_threshold() -> f64 {
    0.8
}

fn default_max_token_distance() -> usize {
    2
}

fn default_true() -> bool {
    true
}
