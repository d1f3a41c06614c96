//! The unit of storage: one cached upstream response.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{CachedResponse, CanonicalRequest};

/// One cached response, owned by the [`store`](super::store). Mutated only
/// by `Lookup` (access bookkeeping via [`Entry::touch`]) and destroyed by
/// eviction; `Store` is the only creator.
#[derive(Debug, Clone)]
pub struct Entry {
    pub exact_key: String,
    pub short_hash: String,
    pub tenant_id: String,
    pub request: CanonicalRequest,
    pub response: CachedResponse,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_access: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
    pub compressed: Option<CompressionInfo>,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct CompressionInfo {
    pub original_size: usize,
}

impl Entry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Increments `access_count` and bumps `last_access` to `now`. Moving
    /// the key to the most-recent position in the recency list is the
    /// store's responsibility, not the entry's.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_access = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CanonicalRequest, Role};
    use std::collections::BTreeMap;

    fn sample_entry(now: DateTime<Utc>) -> Entry {
        Entry {
            exact_key: "key".into(),
            short_hash: "hash".into(),
            tenant_id: "tenant-a".into(),
            request: CanonicalRequest {
                model: "gpt-4o".into(),
                messages: vec![],
                settings: BTreeMap::new(),
            },
            response: CachedResponse {
                id: "r1".into(),
                body: vec![],
                content_type: "application/json".into(),
                provider: "openai".into(),
            },
            created_at: now,
            expires_at: now + chrono::Duration::seconds(60),
            access_count: 1,
            last_access: now,
            embedding: None,
            compressed: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn touch_increments_access_count_and_bumps_last_access() {
        let now = Utc::now();
        let mut entry = sample_entry(now);
        let later = now + chrono::Duration::seconds(5);
        entry.touch(later);
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_access, later);
    }

    #[test]
    fn is_expired_boundary() {
        let now = Utc::now();
        let entry = sample_entry(now);
        assert!(!entry.is_expired(entry.expires_at - chrono::Duration::seconds(1)));
        assert!(entry.is_expired(entry.expires_at));
    }

    #[test]
    fn role_is_unrelated_to_entry_destruction() {
        // Entries don't inspect message roles; this exercises that an
        // entry carrying assistant-authored content still round-trips.
        let now = Utc::now();
        let mut entry = sample_entry(now);
        entry.request.messages.push(crate::types::Message {
            role: Role::Assistant,
            content: crate::types::MessageContent::Text("hi".into()),
        });
        assert_eq!(entry.request.messages.len(), 1);
    }
}
