//! Strategy-pluggable, multi-tenant response cache for a multi-provider LLM
//! gateway.
//!
//! The gateway itself — provider adapters, batching, PII masking, rate
//! limiting, audit logging, and the HTTP handlers that front all of this —
//! lives outside this crate. What's here is the cache that sits in front of
//! it: normalisation, fingerprinting, four lookup strategies (exact,
//! semantic, token, hybrid), an in-memory LRU store, statistics, an
//! adaptive controller that self-tunes the active strategy from live
//! hit-rate telemetry, and a bounded pattern detector. See
//! [`cache::manager::CacheManager`] for the facade most callers want.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod observability;
pub mod types;

pub use cache::manager::CacheManager;
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult, ConfigError};
