//! The cache manager facade: owns the store, statistics, adaptive state,
//! configuration, and the two background schedules, and is the only type
//! a caller outside this module needs to hold.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Timelike;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, Strategy};
use crate::error::{CacheError, CacheResult};
use crate::observability::metrics;
use crate::types::{CachedResponse, UpstreamRequest};

use super::adaptive::AdaptiveState;
use super::embedding::{pseudo_embedding, EmbeddingProvider};
use super::entry::Entry;
use super::fingerprint::Fingerprinter;
use super::normalizer::Normalizer;
use super::stats::{StatsSnapshot, Statistics};
use super::store::Store;
use super::strategy::{self, LookupParams, LookupResult};

struct Shared {
    config: CacheConfig,
    store: Store,
    stats: Statistics,
    adaptive: Option<AdaptiveState>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    clock: Arc<dyn Clock>,
}

/// Owns lifecycle, dispatches `Lookup` and `Store`, and glues every other
/// component together. Cloning a `CacheManager` is cheap (it's an `Arc`
/// underneath); dropping every clone without calling [`CacheManager::stop`]
/// leaves the background schedules running until the process exits, so
/// callers are expected to call `stop` during graceful shutdown.
#[derive(Clone)]
pub struct CacheManager {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    tasks: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>>,
}

impl CacheManager {
    pub fn new(config: CacheConfig, embedding_provider: Option<Arc<dyn EmbeddingProvider>>) -> CacheResult<Self> {
        Self::with_clock(config, embedding_provider, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: CacheConfig,
        embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
        clock: Arc<dyn Clock>,
    ) -> CacheResult<Self> {
        config.validate()?;

        let now = clock.now();
        let adaptive = if config.strategy == Strategy::Adaptive {
            Some(AdaptiveState::new(now))
        } else {
            None
        };

        let shared = Arc::new(Shared {
            config,
            store: Store::new(),
            stats: Statistics::new(),
            adaptive,
            embedding_provider,
            clock,
        });

        let shutdown = CancellationToken::new();
        let mut tasks = Vec::new();

        tasks.push(spawn_eviction_loop(shared.clone(), shutdown.clone()));
        if shared.config.strategy == Strategy::Adaptive {
            tasks.push(spawn_tuning_loop(shared.clone(), shutdown.clone()));
        }

        Ok(Self {
            shared,
            shutdown,
            tasks: Arc::new(std::sync::Mutex::new(tasks)),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// The strategy actually in effect right now: the configured strategy
    /// in non-adaptive modes, or the adaptive state's current sub-strategy.
    pub fn active_strategy(&self) -> Strategy {
        match &self.shared.adaptive {
            Some(adaptive) => adaptive.current_strategy(),
            None => self.shared.config.strategy,
        }
    }

    pub async fn lookup(
        &self,
        cancel: &CancellationToken,
        request: &UpstreamRequest,
        tenant: &str,
    ) -> CacheResult<LookupResult> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        if !self.shared.config.enabled {
            return Ok(LookupResult {
                found: false,
                entry: None,
                strategy: Strategy::None,
                similarity: 0.0,
                latency: std::time::Duration::ZERO,
                source: "memory".to_string(),
            });
        }

        let canonical = Normalizer::normalize(request);
        let now = self.shared.clock.now();
        let active = self.active_strategy();

        let params = LookupParams {
            store: &self.shared.store,
            config: &self.shared.config,
            canonical: &canonical,
            tenant,
            embedding_provider: self.shared.embedding_provider.as_deref(),
            cancel,
            now,
        };

        let result = strategy::lookup(active, &params).await;

        self.shared.stats.record_lookup(
            result.found,
            &result.strategy.to_string(),
            tenant,
            self.shared.config.per_tenant_limits,
            now,
        );

        metrics::record_lookup(&result.strategy.to_string(), if result.found { "hit" } else { "miss" });
        metrics::record_lookup_latency(&result.strategy.to_string(), result.latency.as_secs_f64());

        if let Some(adaptive) = &self.shared.adaptive {
            let adaptive_cfg = self.shared.config.adaptive_config.as_ref();
            let pattern_enabled = adaptive_cfg.map(|c| c.enable_pattern_detection).unwrap_or(false);
            adaptive.record_sample(
                &canonical.model,
                now.hour() as u8,
                tenant,
                canonical.estimated_query_length(),
                pattern_enabled,
            );
        }

        Ok(result)
    }

    pub async fn store(
        &self,
        cancel: &CancellationToken,
        request: &UpstreamRequest,
        response: CachedResponse,
        tenant: &str,
    ) -> CacheResult<()> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        if !self.shared.config.enabled {
            return Ok(());
        }

        let canonical = Normalizer::normalize(request);
        let now = self.shared.clock.now();
        let fingerprint = Fingerprinter::fingerprint(&canonical, tenant);

        let embedding = if self.shared.config.semantic_config.is_some() {
            Some(self.compute_embedding(cancel, &canonical).await)
        } else {
            None
        };

        let response_size = response.body.len();

        let entry = Entry {
            exact_key: fingerprint.exact_key,
            short_hash: fingerprint.short_hash,
            tenant_id: tenant.to_string(),
            request: canonical,
            response,
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(self.shared.config.ttl_for_entry(tenant, embedding.is_some()))
                    .unwrap_or_else(|_| chrono::Duration::seconds(1)),
            access_count: 1,
            last_access: now,
            embedding,
            compressed: None,
            metadata: HashMap::new(),
        };

        let evicted = self.shared.store.put(entry, self.shared.config.max_entries);
        self.shared.stats.record_store(self.shared.store.len(), now);
        if evicted {
            self.shared.stats.record_eviction(1, now);
            metrics::record_eviction(1, "capacity");
        }
        metrics::record_store("success");

        if let Some(adaptive) = &self.shared.adaptive {
            let pattern_enabled = self
                .shared
                .config
                .adaptive_config
                .as_ref()
                .map(|c| c.enable_pattern_detection)
                .unwrap_or(false);
            adaptive.record_response_size(response_size, pattern_enabled);
        }

        Ok(())
    }

    async fn compute_embedding(&self, cancel: &CancellationToken, canonical: &crate::types::CanonicalRequest) -> Vec<f32> {
        let text = canonical
            .messages
            .iter()
            .map(|m| m.content.as_text())
            .collect::<Vec<_>>()
            .join(" ");

        match &self.shared.embedding_provider {
            Some(provider) => match provider.embed(cancel, &text).await {
                Ok(v) => {
                    metrics::record_embedding_generation("configured", "success");
                    v
                }
                Err(err) => {
                    tracing::debug!(error = %err, "embedding generation failed while storing, proceeding without a real embedding");
                    metrics::record_embedding_generation("configured", "error");
                    pseudo_embedding(&text)
                }
            },
            None => pseudo_embedding(&text),
        }
    }

    pub fn clear(&self) {
        self.shared.store.clear();
    }

    pub fn clear_tenant(&self, tenant: &str) {
        self.shared.store.clear_tenant(tenant);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.shared.stats.snapshot(self.shared.clock.now())
    }

    /// Records a manual strategy override from a management endpoint. Only
    /// meaningful in adaptive mode; a no-op (but not an error) otherwise.
    pub fn manual_override(&self, to: Strategy) {
        if let Some(adaptive) = &self.shared.adaptive {
            let hit_rate = self.shared.stats.hit_rate();
            adaptive.manual_override(to, self.shared.clock.now(), hit_rate);
            metrics::record_strategy_change(
                &self.active_strategy().to_string(),
                &to.to_string(),
                "manual_override",
            );
        }
    }

    pub fn adaptive_history(&self) -> Vec<super::adaptive::StrategyChange> {
        self.shared
            .adaptive
            .as_ref()
            .map(|a| a.history())
            .unwrap_or_default()
    }

    /// A snapshot of the adaptive controller's pattern tallies, or `None`
    /// outside adaptive mode. Backs the management surface's "adaptive
    /// state" endpoint.
    pub fn pattern_snapshot(&self) -> Option<super::pattern::PatternData> {
        self.shared.adaptive.as_ref().map(|a| a.pattern_snapshot())
    }

    /// Signals both background schedules to terminate and waits for them
    /// to exit. Idempotent.
    pub async fn stop(&self) -> CacheResult<()> {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.tasks.lock().map_err(|_| CacheError::Internal("task list poisoned".into()))?;
            std::mem::take(&mut *guard)
        };
        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }
}

fn spawn_eviction_loop(shared: Arc<Shared>, shutdown: CancellationToken) -> JoinHandle<()> {
    let interval = shared.config.eviction_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("eviction loop shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    let now = shared.clock.now();
                    let expired = shared.store.evict_expired(now);
                    let over_capacity = shared.store.evict_to_capacity(shared.config.max_entries);
                    let total = (expired + over_capacity) as u64;
                    if total > 0 {
                        shared.stats.record_eviction(total, now);
                        metrics::record_eviction(total, "ttl_sweep");
                    }
                }
            }
        }
    })
}

fn spawn_tuning_loop(shared: Arc<Shared>, shutdown: CancellationToken) -> JoinHandle<()> {
    let Some(adaptive_cfg) = shared.config.adaptive_config.clone() else {
        return tokio::spawn(async {});
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(adaptive_cfg.tuning_interval());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("adaptive tuning loop shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if !adaptive_cfg.enable_auto_tuning {
                        continue;
                    }
                    let Some(adaptive) = &shared.adaptive else { continue };
                    let now = shared.clock.now();
                    if let Some(change) = adaptive.maybe_tune(&adaptive_cfg, &shared.stats, now) {
                        tracing::info!(from = %change.from, to = %change.to, reason = %change.reason, "adaptive strategy transition");
                        metrics::record_strategy_change(&change.from.to_string(), &change.to.to_string(), &change.reason);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AdaptiveConfig;
    use crate::types::{Message, MessageContent, Role};

    fn request(model: &str, text: &str) -> UpstreamRequest {
        UpstreamRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: Role::User,
                content: MessageContent::Text(text.to_string()),
            }],
            temperature: Some(0.7),
            max_tokens: Some(100),
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
        }
    }

    fn response(id: &str) -> CachedResponse {
        CachedResponse {
            id: id.to_string(),
            body: b"{}".to_vec(),
            content_type: "application/json".to_string(),
            provider: "openai".to_string(),
        }
    }

    #[tokio::test]
    async fn s1_exact_hit_and_tenant_isolation() {
        let mut config = CacheConfig::default();
        config.strategy = Strategy::Exact;
        config.max_entries = 100;
        let manager = CacheManager::new(config, None).unwrap();
        let cancel = CancellationToken::new();
        let req = request("gpt-4o", "Hello, world!");

        manager.store(&cancel, &req, response("r1"), "A").await.unwrap();

        let hit = manager.lookup(&cancel, &req, "A").await.unwrap();
        assert!(hit.found);
        assert_eq!(hit.strategy, Strategy::Exact);
        assert_eq!(hit.similarity, 1.0);
        assert_eq!(hit.entry.unwrap().response.id, "r1");

        let miss = manager.lookup(&cancel, &req, "B").await.unwrap();
        assert!(!miss.found);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn s2_capacity_eviction() {
        let mut config = CacheConfig::default();
        config.max_entries = 3;
        let manager = CacheManager::new(config, None).unwrap();
        let cancel = CancellationToken::new();

        for i in 0..4 {
            let req = request("gpt-4o", &format!("message {i}"));
            manager.store(&cancel, &req, response(&format!("r{i}")), "A").await.unwrap();
        }

        assert_eq!(manager.shared.store.len(), 3);
        let m0 = manager.lookup(&cancel, &request("gpt-4o", "message 0"), "A").await.unwrap();
        assert!(!m0.found);
        let m3 = manager.lookup(&cancel, &request("gpt-4o", "message 3"), "A").await.unwrap();
        assert!(m3.found);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn s3_ttl_expiry() {
        let clock = Arc::new(ManualClock::new());
        let mut config = CacheConfig::default();
        config.default_ttl_secs = 1;
        let manager = CacheManager::with_clock(config, None, clock.clone()).unwrap();
        let cancel = CancellationToken::new();
        let req = request("gpt-4o", "hello");

        manager.store(&cancel, &req, response("r1"), "A").await.unwrap();
        clock.advance(chrono::Duration::seconds(2));

        let result = manager.lookup(&cancel, &req, "A").await.unwrap();
        assert!(!result.found);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn disabled_cache_is_total_and_a_noop() {
        let mut config = CacheConfig::default();
        config.enabled = false;
        let manager = CacheManager::new(config, None).unwrap();
        let cancel = CancellationToken::new();
        let req = request("gpt-4o", "hello");

        manager.store(&cancel, &req, response("r1"), "A").await.unwrap();
        let result = manager.lookup(&cancel, &req, "A").await.unwrap();
        assert!(!result.found);
        assert_eq!(result.strategy, Strategy::None);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_token_surfaces_immediately() {
        let config = CacheConfig::default();
        let manager = CacheManager::new(config, None).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let req = request("gpt-4o", "hello");

        let result = manager.lookup(&cancel, &req, "A").await;
        assert!(matches!(result, Err(CacheError::Cancelled)));

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn clear_tenant_isolates_other_tenants() {
        let config = CacheConfig::default();
        let manager = CacheManager::new(config, None).unwrap();
        let cancel = CancellationToken::new();
        let req = request("gpt-4o", "hello");

        manager.store(&cancel, &req, response("r1"), "A").await.unwrap();
        manager.store(&cancel, &req, response("r2"), "B").await.unwrap();
        manager.clear_tenant("A");

        assert!(!manager.lookup(&cancel, &req, "A").await.unwrap().found);
        assert!(manager.lookup(&cancel, &req, "B").await.unwrap().found);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn statistics_coherence() {
        let config = CacheConfig::default();
        let manager = CacheManager::new(config, None).unwrap();
        let cancel = CancellationToken::new();
        let req = request("gpt-4o", "hello");

        manager.store(&cancel, &req, response("r1"), "A").await.unwrap();
        manager.lookup(&cancel, &req, "A").await.unwrap();
        manager.lookup(&cancel, &request("gpt-4o", "goodbye"), "A").await.unwrap();

        let snap = manager.snapshot();
        assert_eq!(snap.hits + snap.misses, 2);
        assert!(snap.hit_rate >= 0.0 && snap.hit_rate <= 1.0);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn s4_adaptive_low_hit_progression() {
        let clock = Arc::new(ManualClock::new());
        let mut config = CacheConfig::default();
        config.strategy = Strategy::Adaptive;
        config.adaptive_config = Some(AdaptiveConfig {
            learning_window_secs: 60,
            min_samples: 5,
            sensitivity: 0.5,
            high_hit_threshold: 0.7,
            low_hit_threshold: 0.2,
            enable_pattern_detection: true,
            enable_auto_tuning: true,
            tuning_interval_secs: 60,
        });
        let manager = CacheManager::with_clock(config, None, clock.clone()).unwrap();
        let cancel = CancellationToken::new();

        // 2 hits, 8 misses: store two requests and hit them, miss 8 distinct ones.
        let hit_req = request("gpt-4o", "known message");
        manager.store(&cancel, &hit_req, response("r1"), "A").await.unwrap();
        for _ in 0..2 {
            manager.lookup(&cancel, &hit_req, "A").await.unwrap();
        }
        for i in 0..8 {
            manager.lookup(&cancel, &request("gpt-4o", &format!("unknown {i}")), "A").await.unwrap();
        }

        clock.advance(chrono::Duration::seconds(120));

        let adaptive = manager.shared.adaptive.as_ref().unwrap();
        let adaptive_cfg = manager.shared.config.adaptive_config.clone().unwrap();
        let change = adaptive
            .maybe_tune(&adaptive_cfg, &manager.shared.stats, clock.now())
            .expect("expected a transition");
        assert_eq!(change.from, Strategy::Exact);
        assert_eq!(change.to, Strategy::Semantic);
        assert!(change.reason.contains("low hit rate"));

        manager.stop().await.unwrap();
    }
}
