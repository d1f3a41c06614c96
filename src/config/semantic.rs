use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the semantic (embedding-based) matching strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct SemanticConfig {
    /// Minimum cosine similarity for a candidate to count as a hit.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Name of the embedding provider collaborator to use, e.g. `"openai"`.
    /// Left unset (or `"none"`) to fall back to the deterministic
    /// pseudo-embedding.
    #[serde(default)]
    pub embedding_provider: Option<String>,

    #[serde(default)]
    pub embedding_model: Option<String>,

    #[serde(default)]
    pub similarity_algorithm: SimilarityAlgorithm,

    /// Advisory rate limit on embedding calls; the core does not enforce
    /// this itself, but a real embedding provider may consult it.
    #[serde(default = "default_max_embeddings_per_hour")]
    pub max_embeddings_per_hour: u32,

    #[serde(default = "default_true")]
    pub cache_embeddings: bool,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            embedding_provider: None,
            embedding_model: None,
            similarity_algorithm: SimilarityAlgorithm::default(),
            max_embeddings_per_hour: default_max_embeddings_per_hour(),
            cache_embeddings: default_true(),
        }
    }
}

impl SemanticConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Validation(
                "semantic_config.similarity_threshold must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum SimilarityAlgorithm {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

fn default_similarity_threshold() -> f64 {
    0.95
}

fn default_max_embeddings_per_hour() -> u32 {
    1_000
}

fn default_true() -> bool {
    true
}
