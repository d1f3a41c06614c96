//! Global, per-strategy, and per-tenant counters, guarded by their own lock
//! (independent of the entry store's lock, per the concurrency model).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
pub struct TenantCounters {
    pub hits: u64,
    pub misses: u64,
}

impl TenantCounters {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Advisory per-entry memory cost used to derive `StatsSnapshot::estimated_memory_bytes`.
/// Per §5, `max_memory_mb` is never enforced against an actual byte count —
/// this rough estimate is the one the statistics aggregator is allowed to
/// report.
const ESTIMATED_BYTES_PER_ENTRY: u64 = 10 * 1024;

#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
    pub total_entries: u64,
    pub hit_rate: f64,
    pub strategy_hits: HashMap<String, u64>,
    pub per_tenant: HashMap<String, TenantCounters>,
    pub last_updated: Option<DateTime<Utc>>,
    /// `total_entries * 10 KB`, the advisory estimate named in §5. Not a
    /// measurement of actual payload size and never used to enforce
    /// `max_memory_mb`.
    pub estimated_memory_bytes: u64,
}

impl StatsSnapshot {
    pub fn estimated_memory_mb(&self) -> f64 {
        self.estimated_memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Default)]
struct Inner {
    hits: u64,
    misses: u64,
    stores: u64,
    evictions: u64,
    total_entries: u64,
    strategy_hits: HashMap<String, u64>,
    per_tenant: HashMap<String, TenantCounters>,
    last_updated: Option<DateTime<Utc>>,
}

pub struct Statistics {
    inner: RwLock<Inner>,
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Records the outcome of one lookup. `tenant` is only attributed to
    /// the per-tenant counters when tenant isolation is enabled and the
    /// tenant is non-empty.
    pub fn record_lookup(
        &self,
        found: bool,
        strategy: &str,
        tenant: &str,
        tenant_isolation_enabled: bool,
        now: DateTime<Utc>,
    ) {
        let mut inner = self.inner.write();
        if found {
            inner.hits += 1;
            *inner.strategy_hits.entry(strategy.to_string()).or_insert(0) += 1;
        } else {
            inner.misses += 1;
        }

        if tenant_isolation_enabled && !tenant.is_empty() {
            let counters = inner.per_tenant.entry(tenant.to_string()).or_default();
            if found {
                counters.hits += 1;
            } else {
                counters.misses += 1;
            }
        }

        inner.last_updated = Some(now);
    }

    pub fn record_store(&self, total_entries: usize, now: DateTime<Utc>) {
        let mut inner = self.inner.write();
        inner.stores += 1;
        inner.total_entries = total_entries as u64;
        inner.last_updated = Some(now);
    }

    pub fn record_eviction(&self, count: u64, now: DateTime<Utc>) {
        if count == 0 {
            return;
        }
        let mut inner = self.inner.write();
        inner.evictions += count;
        inner.last_updated = Some(now);
    }

    /// Current global hit rate, used by the adaptive controller. Does not
    /// take a snapshot of the full counter set.
    pub fn hit_rate(&self) -> f64 {
        let inner = self.inner.read();
        let total = inner.hits + inner.misses;
        if total == 0 {
            0.0
        } else {
            inner.hits as f64 / total as f64
        }
    }

    pub fn total_hits(&self) -> u64 {
        self.inner.read().hits
    }

    pub fn total_misses(&self) -> u64 {
        self.inner.read().misses
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> StatsSnapshot {
        let inner = self.inner.read();
        let total = inner.hits + inner.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            inner.hits as f64 / total as f64
        };
        StatsSnapshot {
            hits: inner.hits,
            misses: inner.misses,
            stores: inner.stores,
            evictions: inner.evictions,
            total_entries: inner.total_entries,
            hit_rate,
            strategy_hits: inner.strategy_hits.clone(),
            per_tenant: inner.per_tenant.clone(),
            last_updated: Some(now),
            estimated_memory_bytes: inner.total_entries * ESTIMATED_BYTES_PER_ENTRY,
        }
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}
