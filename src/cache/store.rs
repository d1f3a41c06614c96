//! The in-memory entry store: a key→entry mapping paired with an explicit
//! recency list, both guarded by a single reader-writer lock.
//!
//! `Lookup` takes the read lock to scan, releases it, then takes the write
//! lock to `touch` — an entry can be evicted in between. That race is
//! tolerated by design: `touch` simply finds nothing to do and the caller
//! treats it as a miss, per the concurrency model's "race between scan and
//! touch" note.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::entry::Entry;

struct Inner {
    entries: HashMap<String, Entry>,
    /// Most-recent-last. A permutation of `entries`'s key set at every
    /// observation point outside of the brief critical sections below.
    recency: VecDeque<String>,
}

impl Inner {
    fn remove_from_recency(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
    }
}

pub struct Store {
    inner: RwLock<Inner>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a clone of the entry, if present, without touching access
    /// bookkeeping or expiry — callers check expiry themselves so that
    /// "found but expired" and "not found" can be distinguished if needed.
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.inner.read().entries.get(key).cloned()
    }

    /// Inserts `entry`, evicting the single least-recently-used entry first
    /// if the store is at capacity and `entry`'s key is not already
    /// present. Returns `true` if an eviction occurred.
    pub fn put(&self, entry: Entry, max_entries: usize) -> bool {
        let mut inner = self.inner.write();
        let mut evicted = false;

        if !inner.entries.contains_key(&entry.exact_key) && inner.entries.len() >= max_entries {
            if let Some(oldest) = inner.recency.pop_front() {
                inner.entries.remove(&oldest);
                evicted = true;
            }
        }

        inner.remove_from_recency(&entry.exact_key);
        inner.recency.push_back(entry.exact_key.clone());
        inner.entries.insert(entry.exact_key.clone(), entry);
        evicted
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        inner.remove_from_recency(key);
        inner.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.recency.clear();
    }

    /// Removes every entry owned by `tenant`. Returns the number removed.
    pub fn clear_tenant(&self, tenant: &str) -> usize {
        let mut inner = self.inner.write();
        let keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.tenant_id == tenant)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            inner.entries.remove(key);
            inner.remove_from_recency(key);
        }
        keys.len()
    }

    /// Bumps access bookkeeping and moves `key` to the most-recent position.
    /// Returns `false` if the key was evicted in the window between the
    /// caller's read-locked scan and this write-locked touch.
    pub fn touch(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write();
        if !inner.entries.contains_key(key) {
            return false;
        }
        if let Some(e) = inner.entries.get_mut(key) {
            e.touch(now);
        }
        inner.remove_from_recency(key);
        inner.recency.push_back(key.to_string());
        true
    }

    /// Sweeps expired entries. Returns the number evicted.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.entries.remove(key);
            inner.remove_from_recency(key);
        }
        expired.len()
    }

    /// Evicts the oldest entries (by recency order) until at most
    /// `max_entries` remain. Returns the number evicted.
    pub fn evict_to_capacity(&self, max_entries: usize) -> usize {
        let mut inner = self.inner.write();
        let mut evicted = 0;
        while inner.entries.len() > max_entries {
            match inner.recency.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    /// Clones every non-expired entry matching `tenant` (when
    /// `enforce_tenant` is set) and `model`. Used by the semantic and token
    /// strategies, which need to scan candidates rather than look up a
    /// single key.
    pub fn candidates(
        &self,
        now: DateTime<Utc>,
        tenant: &str,
        enforce_tenant: bool,
        model: &str,
        require_embedding: bool,
    ) -> Vec<Entry> {
        let inner = self.inner.read();
        inner
            .entries
            .values()
            .filter(|e| !e.is_expired(now))
            .filter(|e| !enforce_tenant || e.tenant_id == tenant)
            .filter(|e| e.request.model == model)
            .filter(|e| !require_embedding || e.embedding.is_some())
            .cloned()
            .collect()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
