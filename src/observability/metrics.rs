//! Metric emission for the cache subsystem.
//!
//! Every function here has two bodies: under `feature = "prometheus"` it
//! records through the `metrics` facade (which the exporter installed by
//! [`init_metrics`] then scrapes); otherwise it's a no-op. Callers never
//! need to `cfg`-gate their own call sites.

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "prometheus")]
use once_cell::sync::OnceCell;

#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the Prometheus recorder. Safe to call more than once; only the
/// first call takes effect.
#[cfg(feature = "prometheus")]
pub fn init_metrics() {
    if PROMETHEUS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to install prometheus recorder");
        }
    }
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics() {}

/// Renders the current Prometheus text exposition, if the exporter is
/// installed.
#[cfg(feature = "prometheus")]
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

#[cfg(not(feature = "prometheus"))]
pub fn render() -> Option<String> {
    None
}

pub fn record_lookup(strategy: &str, result: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("cache_lookups_total", "strategy" => strategy.to_string(), "result" => result.to_string())
            .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (strategy, result);
    }
}

pub fn record_lookup_latency(strategy: &str, seconds: f64) {
    #[cfg(feature = "prometheus")]
    {
        histogram!("cache_lookup_duration_seconds", "strategy" => strategy.to_string()).record(seconds);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (strategy, seconds);
    }
}

pub fn record_store(result: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("cache_stores_total", "result" => result.to_string()).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = result;
    }
}

pub fn record_eviction(count: u64, reason: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("cache_evictions_total", "reason" => reason.to_string()).increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (count, reason);
    }
}

pub fn record_strategy_change(from: &str, to: &str, reason: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "cache_strategy_changes_total",
            "from" => from.to_string(),
            "to" => to.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (from, to, reason);
    }
}

pub fn record_embedding_generation(provider: &str, result: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "cache_embedding_generation_total",
            "provider" => provider.to_string(),
            "result" => result.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (provider, result);
    }
}
