//! Self-tuning strategy controller, active only when the configured
//! top-level strategy is `adaptive`. Shares no lock with the entry store or
//! the statistics aggregator — per the concurrency model's lock-ordering
//! rule, code that needs more than one of these locks always acquires
//! entry-store, then statistics, then adaptive.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::config::AdaptiveConfig;
use crate::config::Strategy;

use super::pattern::PatternData;
use super::stats::Statistics;

#[derive(Debug, Clone)]
pub struct StrategyChange {
    pub timestamp: DateTime<Utc>,
    pub from: Strategy,
    pub to: Strategy,
    pub reason: String,
    pub hit_rate: f64,
    pub metrics: HashMap<String, u64>,
}

struct Inner {
    current_strategy: Strategy,
    last_evaluation: DateTime<Utc>,
    sample_count: u64,
    history: Vec<StrategyChange>,
    pattern: PatternData,
}

pub struct AdaptiveState {
    inner: RwLock<Inner>,
}

impl AdaptiveState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                current_strategy: Strategy::Exact,
                last_evaluation: now,
                sample_count: 0,
                history: Vec::new(),
                pattern: PatternData::new(),
            }),
        }
    }

    pub fn current_strategy(&self) -> Strategy {
        self.inner.read().current_strategy
    }

    pub fn history_len(&self) -> usize {
        self.inner.read().history.len()
    }

    pub fn history(&self) -> Vec<StrategyChange> {
        self.inner.read().history.clone()
    }

    pub fn pattern_snapshot(&self) -> PatternData {
        self.inner.read().pattern.clone()
    }

    /// Called from `Lookup` after statistics are recorded. `sample_count`
    /// always advances; the pattern tallies only update when pattern
    /// detection is enabled.
    pub fn record_sample(&self, model: &str, hour: u8, tenant: &str, query_length: usize, pattern_detection_enabled: bool) {
        let mut inner = self.inner.write();
        inner.sample_count += 1;
        if pattern_detection_enabled {
            inner.pattern.record(model, hour, tenant, query_length);
        }
    }

    pub fn record_response_size(&self, size: usize, pattern_detection_enabled: bool) {
        if !pattern_detection_enabled {
            return;
        }
        self.inner.write().pattern.record_response_size(size);
    }

    /// Records a manual strategy override from the management surface.
    pub fn manual_override(&self, to: Strategy, now: DateTime<Utc>, hit_rate: f64) {
        let mut inner = self.inner.write();
        let from = inner.current_strategy;
        inner.history.push(StrategyChange {
            timestamp: now,
            from,
            to,
            reason: "manual_override".to_string(),
            hit_rate,
            metrics: HashMap::new(),
        });
        inner.current_strategy = to;
    }

    /// Runs one tuning pass. Returns the transition, if any. A pass is
    /// skipped entirely (no state mutated at all) when the learning window
    /// or minimum sample count has not yet been met.
    pub fn maybe_tune(&self, config: &AdaptiveConfig, stats: &Statistics, now: DateTime<Utc>) -> Option<StrategyChange> {
        let mut inner = self.inner.write();

        if now - inner.last_evaluation < config.learning_window() {
            return None;
        }
        if inner.sample_count < config.min_samples {
            return None;
        }

        let hit_rate = stats.hit_rate();
        let current = inner.current_strategy;

        let transition = if hit_rate < config.low_hit_threshold {
            let next = next_in_rotation(current);
            let reason = if next == Strategy::Exact {
                "reset to exact matching".to_string()
            } else {
                format!("low hit rate with {current}")
            };
            Some((next, reason))
        } else if hit_rate > config.high_hit_threshold && current == Strategy::Exact {
            Some((Strategy::Hybrid, "high hit rate, enabling hybrid caching".to_string()))
        } else {
            None
        };

        let result = transition.map(|(to, reason)| {
            let mut metrics = HashMap::new();
            metrics.insert("total_hits".to_string(), stats.total_hits());
            metrics.insert("total_misses".to_string(), stats.total_misses());
            metrics.insert("sample_count".to_string(), inner.sample_count);

            let change = StrategyChange {
                timestamp: now,
                from: current,
                to,
                reason,
                hit_rate,
                metrics,
            };
            inner.history.push(change.clone());
            inner.current_strategy = to;
            change
        });

        inner.last_evaluation = now;
        inner.sample_count = 0;

        result
    }
}

/// `exact -> semantic -> token -> hybrid -> exact`.
fn next_in_rotation(current: Strategy) -> Strategy {
    match current {
        Strategy::Exact => Strategy::Semantic,
        Strategy::Semantic => Strategy::Token,
        Strategy::Token => Strategy::Hybrid,
        Strategy::Hybrid => Strategy::Exact,
        // Adaptive itself and none never occupy `current_strategy`'s slot,
        // but fold to exact so the rotation stays total.
        Strategy::Adaptive | Strategy::None => Strategy::Exact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdaptiveConfig {
        AdaptiveConfig {
            learning_window_secs: 60,
            min_samples: 5,
            sensitivity: 0.5,
            high_hit_threshold: 0.7,
            low_hit_threshold: 0.2,
            enable_pattern_detection: true,
            enable_auto_tuning: true,
            tuning_interval_secs: 60,
        }
    }

    fn seed_hits_misses(stats: &Statistics, hits: u64, misses: u64, now: DateTime<Utc>) {
        for _ in 0..hits {
            stats.record_lookup(true, "exact", "", false, now);
        }
        for _ in 0..misses {
            stats.record_lookup(false, "exact", "", false, now);
        }
    }

    #[test]
    fn low_hit_rate_advances_rotation() {
        let now = Utc::now();
        let state = AdaptiveState::new(now - chrono::Duration::seconds(120));
        let stats = Statistics::new();
        seed_hits_misses(&stats, 2, 8, now);
        for _ in 0..5 {
            state.record_sample("gpt-4o", 0, "", 10, true);
        }

        let change = state.maybe_tune(&config(), &stats, now).expect("should transition");
        assert_eq!(change.from, Strategy::Exact);
        assert_eq!(change.to, Strategy::Semantic);
        assert!(change.reason.contains("low hit rate"));
        assert_eq!(state.current_strategy(), Strategy::Semantic);
        assert_eq!(state.history_len(), 1);
    }

    #[test]
    fn wraps_from_hybrid_to_exact() {
        let now = Utc::now();
        let state = AdaptiveState::new(now - chrono::Duration::seconds(120));
        state.manual_override(Strategy::Hybrid, now - chrono::Duration::seconds(120), 0.0);
        let stats = Statistics::new();
        seed_hits_misses(&stats, 2, 8, now);
        for _ in 0..5 {
            state.record_sample("gpt-4o", 0, "", 10, true);
        }

        let change = state.maybe_tune(&config(), &stats, now).expect("should transition");
        assert_eq!(change.from, Strategy::Hybrid);
        assert_eq!(change.to, Strategy::Exact);
        assert_eq!(change.reason, "reset to exact matching");
    }

    #[test]
    fn quiescent_between_thresholds() {
        let now = Utc::now();
        let state = AdaptiveState::new(now - chrono::Duration::seconds(120));
        let stats = Statistics::new();
        seed_hits_misses(&stats, 5, 5, now);
        for _ in 0..5 {
            state.record_sample("gpt-4o", 0, "", 10, true);
        }

        let change = state.maybe_tune(&config(), &stats, now);
        assert!(change.is_none());
        assert_eq!(state.current_strategy(), Strategy::Exact);
        assert_eq!(state.history_len(), 0);
    }

    #[test]
    fn skipped_before_learning_window_elapses() {
        let now = Utc::now();
        let state = AdaptiveState::new(now - chrono::Duration::seconds(5));
        let stats = Statistics::new();
        seed_hits_misses(&stats, 0, 10, now);
        for _ in 0..10 {
            state.record_sample("gpt-4o", 0, "", 10, true);
        }
        assert!(state.maybe_tune(&config(), &stats, now).is_none());
        assert_eq!(state.current_strategy(), Strategy::Exact);
    }

    #[test]
    fn skipped_below_min_samples() {
        let now = Utc::now();
        let state = AdaptiveState::new(now - chrono::Duration::seconds(120));
        let stats = Statistics::new();
        seed_hits_misses(&stats, 0, 10, now);
        state.record_sample("gpt-4o", 0, "", 10, true);
        assert!(state.maybe_tune(&config(), &stats, now).is_none());
    }

    #[test]
    fn high_hit_rate_from_exact_enables_hybrid() {
        let now = Utc::now();
        let state = AdaptiveState::new(now - chrono::Duration::seconds(120));
        let stats = Statistics::new();
        seed_hits_misses(&stats, 9, 1, now);
        for _ in 0..5 {
            state.record_sample("gpt-4o", 0, "", 10, true);
        }
        let change = state.maybe_tune(&config(), &stats, now).expect("should transition");
        assert_eq!(change.to, Strategy::Hybrid);
        assert!(change.reason.contains("high hit rate"));
    }
}
