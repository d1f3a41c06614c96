//! Typed configuration for the response cache.
//!
//! Loading follows the same shape as the rest of the gateway: a TOML
//! document is deserialised with `deny_unknown_fields` so a typo in a
//! config file fails loudly instead of being silently ignored, every field
//! has a sensible default via `#[serde(default = "...")]`, and a separate
//! `validate()` pass checks the numeric invariants the core itself relies
//! on before a [`CacheManager`](crate::cache::manager::CacheManager) is
//! ever constructed.

mod adaptive;
mod semantic;
mod token;

pub use adaptive::AdaptiveConfig;
pub use semantic::{SemanticConfig, SimilarityAlgorithm};
pub use token::TokenConfig;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level cache configuration, matching the "Configuration surface"
/// recognised options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    #[serde(default)]
    pub max_ttl_secs: Option<u64>,

    #[serde(default)]
    pub semantic_ttl_secs: Option<u64>,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: usize,

    #[serde(default)]
    pub compression_enabled: bool,

    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    #[serde(default)]
    pub invalidation_policy: InvalidationPolicy,

    #[serde(default)]
    pub per_tenant_limits: bool,

    #[serde(default)]
    pub tenant_ttl_overrides: HashMap<String, u64>,

    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,

    #[serde(default)]
    pub semantic_config: Option<SemanticConfig>,

    #[serde(default)]
    pub token_config: Option<TokenConfig>,

    #[serde(default)]
    pub adaptive_config: Option<AdaptiveConfig>,

    /// Background TTL/eviction sweep interval. Defaults to an hour, but is
    /// configurable so tests don't have to wait one for it to fire.
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            strategy: Strategy::default(),
            backend: Backend::default(),
            default_ttl_secs: default_ttl_secs(),
            max_ttl_secs: None,
            semantic_ttl_secs: None,
            max_entries: default_max_entries(),
            max_memory_mb: default_max_memory_mb(),
            compression_enabled: false,
            compression_level: default_compression_level(),
            invalidation_policy: InvalidationPolicy::default(),
            per_tenant_limits: false,
            tenant_ttl_overrides: HashMap::new(),
            enable_metrics: default_true(),
            metrics_interval_secs: default_metrics_interval_secs(),
            semantic_config: None,
            token_config: None,
            adaptive_config: None,
            eviction_interval_secs: default_eviction_interval_secs(),
        }
    }
}

impl CacheConfig {
    /// Parses `contents` as TOML after expanding `${VAR_NAME}` references
    /// against the process environment, the same convention the wider
    /// gateway's own config loader uses.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: Self = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::Validation(
                "max_entries must be greater than 0".into(),
            ));
        }
        if self.max_memory_mb == 0 {
            return Err(ConfigError::Validation(
                "max_memory_mb must be greater than 0".into(),
            ));
        }
        if self.default_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "default_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.max_ttl_secs == Some(0) {
            return Err(ConfigError::Validation(
                "max_ttl_secs must be greater than 0 when set".into(),
            ));
        }
        if self.semantic_ttl_secs == Some(0) {
            return Err(ConfigError::Validation(
                "semantic_ttl_secs must be greater than 0 when set".into(),
            ));
        }
        if matches!(self.strategy, Strategy::Semantic | Strategy::Hybrid) && self.semantic_config.is_none() {
            tracing::debug!(
                strategy = ?self.strategy,
                "strategy requests semantic matching but no semantic_config was supplied; semantic sub-strategy will be skipped"
            );
        }
        if matches!(self.strategy, Strategy::Adaptive) && self.adaptive_config.is_none() {
            return Err(ConfigError::Validation(
                "strategy = adaptive requires adaptive_config".into(),
            ));
        }
        if let Some(semantic) = &self.semantic_config {
            semantic.validate()?;
        }
        if let Some(token) = &self.token_config {
            token.validate()?;
        }
        if let Some(adaptive) = &self.adaptive_config {
            adaptive.validate()?;
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// The TTL to store an entry with: a per-tenant override if one is
    /// configured for `tenant`, else `semantic_ttl_secs` when the entry
    /// carries an embedding and a semantic TTL is configured, else
    /// `default_ttl_secs` — clamped to `max_ttl_secs` when that's set, so a
    /// tenant override or semantic TTL can never outlive the configured
    /// upper bound.
    pub fn ttl_for_entry(&self, tenant: &str, has_embedding: bool) -> Duration {
        let secs = self
            .tenant_ttl_overrides
            .get(tenant)
            .copied()
            .or_else(|| if has_embedding { self.semantic_ttl_secs } else { None })
            .unwrap_or(self.default_ttl_secs);

        let secs = match self.max_ttl_secs {
            Some(max) => secs.min(max),
            None => secs,
        };

        Duration::from_secs(secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    None,
    #[default]
    Exact,
    Semantic,
    Token,
    Hybrid,
    Adaptive,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Strategy::None => "none",
            Strategy::Exact => "exact",
            Strategy::Semantic => "semantic",
            Strategy::Token => "token",
            Strategy::Hybrid => "hybrid",
            Strategy::Adaptive => "adaptive",
        };
        f.write_str(s)
    }
}

/// Memory is the only backend required for correctness; other variants are
/// declared so config files can name a future backend without the parser
/// rejecting the document, but the manager only ever constructs a memory
/// store today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Memory,
    Redis,
    Disk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum InvalidationPolicy {
    #[default]
    Lru,
    Lfu,
    Ttl,
    Random,
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_entries() -> usize {
    10_000
}

fn default_max_memory_mb() -> usize {
    256
}

fn default_compression_level() -> u32 {
    0
}

fn default_metrics_interval_secs() -> u64 {
    60
}

fn default_eviction_interval_secs() -> u64 {
    3600
}

/// Expands `${VAR_NAME}` references in `input` against the process
/// environment. Variables appearing after a `#` on the same line (i.e.
/// inside a TOML comment) are left untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let match_start = cap.get(0).unwrap().start();
            if let Some(pos) = comment_pos {
                if match_start >= pos {
                    continue;
                }
            }

            line_result.push_str(&line[last_end..match_start]);

            let var_name = &cap[1];
            let value = std::env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = cap.get(0).unwrap().end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
