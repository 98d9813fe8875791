//! Cache Store Module
//!
//! Key to entry mapping with size accounting, priority-tiered TTL checks and
//! score-based reclamation. Not synchronized; [`AdaptiveCache`] wraps it in a
//! mutex.
//!
//! [`AdaptiveCache`]: crate::cache::AdaptiveCache

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{estimate_size, CacheEntry, Clock, EvictionPolicy, MetricsRecorder, Priority};
use crate::config::CacheConfig;
use crate::error::Result;

// == Lookup ==
/// Result of a read against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    /// Fresh entry; usage counter was incremented
    Hit(V),
    /// No entry for the key
    Miss,
    /// The entry's TTL had elapsed; it has been removed
    Expired,
}

impl<V> Lookup<V> {
    pub fn into_option(self) -> Option<V> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss | Lookup::Expired => None,
        }
    }
}

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Sum of `size_bytes` over all entries
    total_size_bytes: usize,
    /// Next insertion sequence number
    next_sequence: u64,
    config: CacheConfig,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRecorder>,
}

impl<V: Clone + Serialize> CacheStore<V> {
    // == Constructor ==
    /// Creates an empty store, rejecting invalid configuration.
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            entries: HashMap::new(),
            total_size_bytes: 0,
            next_sequence: 0,
            policy: EvictionPolicy::new(config.priority_weights),
            metrics: Arc::new(MetricsRecorder::new(config.capacity_bytes)),
            config,
            clock,
        })
    }

    // == Put ==
    /// Stores `data` under `key`, replacing any existing entry.
    ///
    /// Returns the keys evicted to make room.
    pub fn put(&mut self, key: String, data: V, priority: Priority) -> Vec<String> {
        let size = estimate_size(&data);
        self.put_sized(key, data, priority, size)
    }

    /// Like [`put`](Self::put) with a precomputed size estimate.
    pub fn put_sized(
        &mut self,
        key: String,
        data: V,
        priority: Priority,
        size_bytes: usize,
    ) -> Vec<String> {
        // Overwrite: old size leaves the budget before the new one is checked.
        // A stale entry being replaced still counts as an expiration; the hook
        // is not fired since the key is being rewritten.
        if let Some(old) = self.entries.remove(&key) {
            self.total_size_bytes -= old.size_bytes;
            if old.is_expired(self.clock.now_ms(), self.ttl_ms(old.priority)) {
                self.metrics.record_expirations(1);
                debug!(key = %key, "replaced expired entry");
            }
        }

        let evicted = if self.total_size_bytes + size_bytes > self.config.capacity_bytes {
            self.reclaim_for(size_bytes)
        } else {
            Vec::new()
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let entry = CacheEntry::new(data, priority, size_bytes, self.clock.now_ms(), sequence);
        self.entries.insert(key, entry);
        self.total_size_bytes += size_bytes;
        self.publish_usage();

        evicted
    }

    // == Put If Absent ==
    /// Inserts only when `key` has no fresh entry.
    ///
    /// Returns `None` when a fresh entry was already present, otherwise the
    /// keys evicted to make room.
    pub fn put_if_absent_sized(
        &mut self,
        key: String,
        data: V,
        priority: Priority,
        size_bytes: usize,
    ) -> Option<Vec<String>> {
        if self.contains(&key) {
            return None;
        }
        Some(self.put_sized(key, data, priority, size_bytes))
    }

    // == Get ==
    /// Looks up `key`, expiring it lazily if its TTL has elapsed.
    ///
    /// Every call records exactly one hit or miss.
    pub fn get(&mut self, key: &str) -> Lookup<V> {
        let now = self.clock.now_ms();

        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now, self.ttl_ms(entry.priority)),
            None => {
                self.metrics.record_miss();
                return Lookup::Miss;
            }
        };

        if expired {
            self.remove_entry(key);
            self.metrics.record_miss();
            self.metrics.record_expirations(1);
            self.publish_usage();
            debug!(key, "lazily expired entry on read");
            return Lookup::Expired;
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch();
                self.metrics.record_hit();
                Lookup::Hit(entry.data.clone())
            }
            None => {
                self.metrics.record_miss();
                Lookup::Miss
            }
        }
    }

    // == Contains ==
    /// True if `key` has a fresh entry. Does not touch metrics or usage.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now, self.ttl_ms(entry.priority)))
    }

    // == Peek ==
    /// Borrows the entry for `key` without any side effects, expired or not.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    // == Remove ==
    /// Removes `key`. Returns false if it was not present.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key);
        if removed {
            self.publish_usage();
        }
        removed
    }

    // == Clear ==
    /// Drops every entry and resets metrics. Returns the number of entries dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.total_size_bytes = 0;
        self.metrics.reset();
        count
    }

    // == Reclaim ==
    /// Evicts the least useful entries until the store is at or below the
    /// reclaim target. Returns the evicted keys.
    pub fn reclaim(&mut self) -> Vec<String> {
        self.reclaim_for(0)
    }

    /// Reclaims room for an incoming entry of `incoming_bytes`.
    ///
    /// Stops once the store is within the reclaim target and the incoming
    /// entry would fit under capacity. If that is unreachable, evicts
    /// everything.
    fn reclaim_for(&mut self, incoming_bytes: usize) -> Vec<String> {
        let target = self.config.reclaim_target_bytes();
        let capacity = self.config.capacity_bytes;
        let within_budget =
            |total: usize| total <= target && total + incoming_bytes <= capacity;

        if within_budget(self.total_size_bytes) {
            return Vec::new();
        }

        let size_before = self.total_size_bytes;
        let ranked = self.policy.rank(&self.entries, self.clock.now_ms());
        let mut evicted = Vec::new();

        for key in ranked {
            if within_budget(self.total_size_bytes) {
                break;
            }
            if self.remove_entry(&key) {
                evicted.push(key);
            }
        }

        self.metrics.record_evictions(evicted.len());
        self.publish_usage();

        if !evicted.is_empty() {
            info!(
                evicted = evicted.len(),
                size_before,
                size_after = self.total_size_bytes,
                "reclaimed cache capacity"
            );
        }

        evicted
    }

    // == Sweep Expired ==
    /// Removes all entries whose TTL has elapsed and publishes memory usage.
    ///
    /// Returns the removed keys.
    pub fn sweep_expired(&mut self) -> Vec<String> {
        let now = self.clock.now_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.ttl_ms(entry.priority)))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = Vec::with_capacity(expired_keys.len());
        for key in expired_keys {
            if self.remove_entry(&key) {
                removed.push(key);
            }
        }

        self.metrics.record_expirations(removed.len());
        self.publish_usage();
        removed
    }

    // == Accessors ==
    /// Sum of all entry sizes in bytes.
    pub fn current_size_bytes(&self) -> usize {
        self.total_size_bytes
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Shared handle to this store's metric counters.
    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        Arc::clone(&self.metrics)
    }

    fn ttl_ms(&self, priority: Priority) -> u64 {
        self.config.ttl_by_priority.get_ms(priority)
    }

    /// Removes `key` and its size. Missing keys are a no-op.
    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.total_size_bytes -= entry.size_bytes;
                true
            }
            None => false,
        }
    }

    fn publish_usage(&self) {
        self.metrics
            .publish_usage(self.total_size_bytes, self.entries.len());
    }
}
