//! Bounded running tallies of recent traffic, consulted (but not acted on
//! directly) by the adaptive controller.

use std::collections::HashMap;

const MAX_SEQUENCE_LEN: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct PatternData {
    pub models: HashMap<String, u64>,
    pub hours: HashMap<u8, u64>,
    pub tenants: HashMap<String, u64>,
    pub query_length: Vec<usize>,
    pub response_size: Vec<usize>,
}

impl PatternData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one observation. `tenant` is only tallied when non-empty;
    /// `hour` is the caller's "current hour of day" (0..23).
    pub fn record(&mut self, model: &str, hour: u8, tenant: &str, query_length: usize) {
        *self.models.entry(model.to_string()).or_insert(0) += 1;
        *self.hours.entry(hour).or_insert(0) += 1;
        if !tenant.is_empty() {
            *self.tenants.entry(tenant.to_string()).or_insert(0) += 1;
        }
        push_bounded(&mut self.query_length, query_length);
    }

    pub fn record_response_size(&mut self, size: usize) {
        push_bounded(&mut self.response_size, size);
    }
}

/// Appends `value`; when the sequence exceeds 1000 entries, drops the
/// oldest half (indices `[0, 500)`) and keeps the rest, per the
/// bounded-window invariant.
fn push_bounded(seq: &mut Vec<usize>, value: usize) {
    seq.push(value);
    if seq.len() > MAX_SEQUENCE_LEN {
        seq.drain(0..500);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_model_hour_tenant() {
        let mut pattern = PatternData::new();
        pattern.record("gpt-4o", 14, "tenant-a", 10);
        pattern.record("gpt-4o", 14, "tenant-a", 20);
        assert_eq!(pattern.models["gpt-4o"], 2);
        assert_eq!(pattern.hours[&14], 2);
        assert_eq!(pattern.tenants["tenant-a"], 2);
    }

    #[test]
    fn empty_tenant_not_tallied() {
        let mut pattern = PatternData::new();
        pattern.record("gpt-4o", 0, "", 5);
        assert!(pattern.tenants.is_empty());
    }

    #[test]
    fn query_length_bounded_at_1000() {
        let mut pattern = PatternData::new();
        for i in 0..1100 {
            pattern.record("gpt-4o", 0, "", i);
        }
        assert!(pattern.query_length.len() <= 1000);
    }

    #[test]
    fn overflow_drops_oldest_half() {
        let mut pattern = PatternData::new();
        for i in 0..1001 {
            pattern.record("gpt-4o", 0, "", i);
        }
        // entries 0..500 dropped; entry 500 (value 500) should be the new front.
        assert_eq!(pattern.query_length[0], 500);
    }
}
