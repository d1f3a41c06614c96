//! The four lookup strategies (exact, semantic, token, hybrid), dispatched
//! on a tagged sum rather than through inheritance.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::{CacheConfig, SimilarityAlgorithm, Strategy};
use crate::types::CanonicalRequest;

use super::embedding::{cosine_similarity, dot_product_similarity, euclidean_similarity, pseudo_embedding, EmbeddingProvider};
use super::entry::Entry;
use super::fingerprint::Fingerprinter;
use super::store::Store;
use super::token as token_sim;

/// Result of one lookup attempt, whichever strategy produced it.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub found: bool,
    pub entry: Option<Entry>,
    pub strategy: Strategy,
    pub similarity: f64,
    pub latency: StdDuration,
    pub source: String,
}

impl LookupResult {
    fn miss(strategy: Strategy, latency: StdDuration) -> Self {
        Self {
            found: false,
            entry: None,
            strategy,
            similarity: 0.0,
            latency,
            source: "memory".to_string(),
        }
    }

    fn hit(entry: Entry, strategy: Strategy, similarity: f64, latency: StdDuration) -> Self {
        Self {
            found: true,
            entry: Some(entry),
            strategy,
            similarity,
            latency,
            source: "memory".to_string(),
        }
    }
}

/// Alias kept so callers describing a lookup from the manager's point of
/// view and callers describing it from the strategy engine's point of view
/// can each use the name that reads better; both name the same type.
pub type LookupOutcome = LookupResult;

pub struct LookupParams<'a> {
    pub store: &'a Store,
    pub config: &'a CacheConfig,
    pub canonical: &'a CanonicalRequest,
    pub tenant: &'a str,
    pub embedding_provider: Option<&'a dyn EmbeddingProvider>,
    pub cancel: &'a CancellationToken,
    pub now: DateTime<Utc>,
}

/// Dispatches to the strategy the caller resolved as active (the manager
/// is responsible for resolving `adaptive` to its current sub-strategy
/// before calling this).
pub async fn lookup(strategy: Strategy, params: &LookupParams<'_>) -> LookupResult {
    let start = std::time::Instant::now();
    let result = match strategy {
        Strategy::None => LookupResult::miss(Strategy::None, StdDuration::ZERO),
        Strategy::Exact => exact_lookup(params),
        Strategy::Semantic => semantic_lookup(params).await,
        Strategy::Token => token_lookup(params),
        Strategy::Hybrid => hybrid_lookup(params).await,
        // The manager never asks the engine to run "adaptive" directly;
        // if it slips through, fail safe to a miss rather than panic.
        Strategy::Adaptive => LookupResult::miss(Strategy::Adaptive, StdDuration::ZERO),
    };
    LookupResult {
        latency: start.elapsed(),
        ..result
    }
}

fn exact_lookup(params: &LookupParams<'_>) -> LookupResult {
    let key = Fingerprinter::key(params.canonical, params.tenant);
    match params.store.get(&key) {
        Some(entry) if !entry.is_expired(params.now) => {
            params.store.touch(&key, params.now);
            LookupResult::hit(entry, Strategy::Exact, 1.0, StdDuration::ZERO)
        }
        _ => LookupResult::miss(Strategy::Exact, StdDuration::ZERO),
    }
}

async fn semantic_lookup(params: &LookupParams<'_>) -> LookupResult {
    let Some(semantic_cfg) = &params.config.semantic_config else {
        return LookupResult::miss(Strategy::Semantic, StdDuration::ZERO);
    };

    let embedding = match &params.embedding_provider {
        Some(provider) => {
            let text = request_text(params.canonical);
            match provider.embed(params.cancel, &text).await {
                Ok(v) => v,
                Err(err) => {
                    tracing::debug!(error = %err, "embedding generation failed, falling back to exact strategy");
                    let mut exact = exact_lookup(params);
                    exact.strategy = Strategy::Exact;
                    return exact;
                }
            }
        }
        None => pseudo_embedding(&request_text(params.canonical)),
    };

    let candidates = params.store.candidates(
        params.now,
        params.tenant,
        params.config.per_tenant_limits,
        &params.canonical.model,
        true,
    );

    let mut best: Option<(Entry, f64)> = None;
    for candidate in candidates {
        let Some(candidate_embedding) = &candidate.embedding else {
            continue;
        };
        let sim = embedding_similarity(semantic_cfg.similarity_algorithm, &embedding, candidate_embedding);
        let is_better = match &best {
            Some((_, best_sim)) => sim > *best_sim,
            None => true,
        };
        if is_better {
            best = Some((candidate, sim));
        }
    }

    match best {
        Some((entry, sim)) if sim >= semantic_cfg.similarity_threshold => {
            params.store.touch(&entry.exact_key, params.now);
            LookupResult::hit(entry, Strategy::Semantic, sim, StdDuration::ZERO)
        }
        _ => LookupResult::miss(Strategy::Semantic, StdDuration::ZERO),
    }
}

fn token_lookup(params: &LookupParams<'_>) -> LookupResult {
    let Some(token_cfg) = &params.config.token_config else {
        return LookupResult::miss(Strategy::Token, StdDuration::ZERO);
    };

    let query_text = request_text(params.canonical);
    let query_tokens = token_sim::tokenize(&query_text, token_cfg);

    let candidates = params.store.candidates(
        params.now,
        params.tenant,
        params.config.per_tenant_limits,
        &params.canonical.model,
        false,
    );

    let mut best: Option<(Entry, f64)> = None;
    for candidate in candidates {
        let candidate_text = request_text(&candidate.request);
        let candidate_tokens = token_sim::tokenize(&candidate_text, token_cfg);
        let sim = token_sim::similarity(&query_tokens, &candidate_tokens, token_cfg);
        let is_better = match &best {
            Some((_, best_sim)) => sim > *best_sim,
            None => true,
        };
        if is_better {
            best = Some((candidate, sim));
        }
    }

    match best {
        Some((entry, sim)) if sim >= token_cfg.token_similarity_threshold => {
            params.store.touch(&entry.exact_key, params.now);
            LookupResult::hit(entry, Strategy::Token, sim, StdDuration::ZERO)
        }
        _ => LookupResult::miss(Strategy::Token, StdDuration::ZERO),
    }
}

async fn hybrid_lookup(params: &LookupParams<'_>) -> LookupResult {
    let exact = exact_lookup(params);
    if exact.found {
        return relabel(exact, Strategy::Hybrid);
    }

    if params.config.semantic_config.is_some() {
        let semantic = semantic_lookup(params).await;
        if semantic.found {
            return relabel(semantic, Strategy::Hybrid);
        }
    }

    if params.config.token_config.is_some() {
        let token = token_lookup(params);
        if token.found {
            return relabel(token, Strategy::Hybrid);
        }
    }

    LookupResult::miss(Strategy::Hybrid, StdDuration::ZERO)
}

fn relabel(mut result: LookupResult, strategy: Strategy) -> LookupResult {
    result.strategy = strategy;
    result
}

/// Dispatches to the configured similarity formula. Cosine is the only
/// algorithm the component design (§4.5) spells out; euclidean and
/// dot-product are named on the configuration surface and implemented
/// straightforwardly so selecting them isn't a silent no-op.
fn embedding_similarity(algorithm: SimilarityAlgorithm, a: &[f32], b: &[f32]) -> f64 {
    match algorithm {
        SimilarityAlgorithm::Cosine => cosine_similarity(a, b),
        SimilarityAlgorithm::Euclidean => euclidean_similarity(a, b),
        SimilarityAlgorithm::DotProduct => dot_product_similarity(a, b),
    }
}

fn request_text(req: &CanonicalRequest) -> String {
    req.messages
        .iter()
        .map(|m| m.content.as_text())
        .collect::<Vec<_>>()
        .join(" ")
}
