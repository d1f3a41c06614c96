use thiserror::Error;

/// Errors that can escape the cache core to a caller.
///
/// Per the error-handling design, most failure categories are recovered
/// locally and never reach this type: a failed embedding falls back to the
/// exact strategy, a failed serialisation falls back to the composite
/// fingerprint, and a full store simply evicts. Only cancellation and
/// configuration rejection are meant to surface.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Configuration validation failures, surfaced verbatim to whoever is
/// constructing a cache manager (typically a management endpoint or a
/// process bootstrapping from a TOML file).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),
}
