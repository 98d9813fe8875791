//! Shared Cache Handle
//!
//! [`AdaptiveCache`] is the handle callers hold. It serializes every store
//! mutation behind a single mutex, serves metric snapshots without that lock,
//! and runs collaborator hooks only after the lock is released.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::cache::{
    estimate_size, CacheMetrics, CacheStore, Clock, Lookup, MetricsRecorder, Priority, SystemClock,
};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::{spawn_sweeper, SweeperHandle};

/// Capacity of the change-notification channel. Slow subscribers lag and
/// skip events rather than blocking the cache.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Called with the key of every evicted or expired entry.
pub type InvalidateHook = Arc<dyn Fn(&str) + Send + Sync>;

// == Cache Event ==
/// Change notification published to [`AdaptiveCache::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Inserted { key: String, priority: Priority },
    Removed { key: String },
    Evicted { key: String },
    Expired { key: String },
    Cleared { entries: usize },
}

pub(crate) struct Shared<V> {
    store: Mutex<CacheStore<V>>,
    metrics: Arc<MetricsRecorder>,
    config: CacheConfig,
    on_invalidate: Option<InvalidateHook>,
    events: broadcast::Sender<CacheEvent>,
}

// == Adaptive Cache ==
/// Cloneable handle to one cache instance.
///
/// Clones share state. The background sweeper is not started implicitly; call
/// [`start_sweeper`](Self::start_sweeper) from within a tokio runtime and keep
/// the returned handle for as long as sweeping should run.
pub struct AdaptiveCache<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for AdaptiveCache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> fmt::Debug for AdaptiveCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveCache")
            .field("config", &self.shared.config)
            .field("metrics", &self.shared.metrics.snapshot())
            .finish()
    }
}

impl<V> AdaptiveCache<V>
where
    V: Clone + Serialize + Send + 'static,
{
    // == Constructor ==
    /// Creates a cache on the system clock with no hooks.
    pub fn new(config: CacheConfig) -> Result<Self> {
        CacheBuilder::new(config).build()
    }

    // == Put ==
    /// Stores `data` under `key`, evicting less useful entries first if the
    /// write would exceed capacity.
    pub fn put(&self, key: impl Into<String>, data: V, priority: Priority) {
        let key = key.into();
        // Serialize outside the lock
        let size = estimate_size(&data);

        let evicted = self
            .shared
            .store
            .lock()
            .put_sized(key.clone(), data, priority, size);

        self.invalidate(&evicted, |key| CacheEvent::Evicted { key });
        self.publish(CacheEvent::Inserted { key, priority });
    }

    // == Put If Absent ==
    /// Stores `data` only if `key` has no fresh entry. Returns whether it was stored.
    pub fn put_if_absent(&self, key: impl Into<String>, data: V, priority: Priority) -> bool {
        let key = key.into();
        let size = estimate_size(&data);

        let outcome = self
            .shared
            .store
            .lock()
            .put_if_absent_sized(key.clone(), data, priority, size);

        match outcome {
            Some(evicted) => {
                self.invalidate(&evicted, |key| CacheEvent::Evicted { key });
                self.publish(CacheEvent::Inserted { key, priority });
                true
            }
            None => false,
        }
    }

    // == Get ==
    /// Returns a copy of the data for `key`, or `None` on a miss.
    ///
    /// An entry whose TTL has elapsed is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let lookup = self.shared.store.lock().get(key);

        if matches!(lookup, Lookup::Expired) {
            self.invalidate(&[key.to_string()], |key| CacheEvent::Expired { key });
        }
        lookup.into_option()
    }

    // == Remove ==
    /// Removes `key`. Returns false if it was not present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.shared.store.lock().remove(key);
        if removed {
            self.publish(CacheEvent::Removed {
                key: key.to_string(),
            });
        }
        removed
    }

    // == Clear ==
    /// Drops every entry and resets metrics.
    pub fn clear(&self) {
        let entries = self.shared.store.lock().clear();
        debug!(entries, "cache cleared");
        self.publish(CacheEvent::Cleared { entries });
    }

    // == Reclaim ==
    /// Runs reclamation now. Returns the number of evicted entries.
    pub fn reclaim(&self) -> usize {
        let evicted = self.shared.store.lock().reclaim();
        self.invalidate(&evicted, |key| CacheEvent::Evicted { key });
        evicted.len()
    }

    // == Sweep Expired ==
    /// Removes every expired entry now. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let expired = self.shared.store.lock().sweep_expired();
        self.invalidate(&expired, |key| CacheEvent::Expired { key });
        expired.len()
    }

    // == Start Sweeper ==
    /// Spawns the periodic expiry sweep on the current tokio runtime.
    ///
    /// The sweep stops when the returned handle is dropped or when the last
    /// cache handle is dropped.
    pub fn start_sweeper(&self) -> SweeperHandle {
        spawn_sweeper(self.downgrade(), self.shared.config.sweep_interval)
    }

    // == Accessors ==
    /// True if `key` has a fresh entry. Does not count as a query.
    pub fn contains(&self, key: &str) -> bool {
        self.shared.store.lock().contains(key)
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.shared.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.store.lock().is_empty()
    }

    /// Sum of all entry size estimates.
    pub fn memory_usage_bytes(&self) -> usize {
        self.shared.store.lock().current_size_bytes()
    }

    /// Usage count of `key`, without touching it or the metrics.
    pub fn usage_count(&self, key: &str) -> Option<u64> {
        self.shared
            .store
            .lock()
            .peek(key)
            .map(|entry| entry.usage_count)
    }

    /// All keys currently stored, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.shared.store.lock().keys()
    }
}

impl<V> AdaptiveCache<V> {
    /// Snapshot of the metric counters. Does not take the store lock.
    pub fn metrics(&self) -> CacheMetrics {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.shared.events.subscribe()
    }

    pub(crate) fn downgrade(&self) -> WeakCache<V> {
        WeakCache {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Runs the invalidation hook and publishes an event for each key.
    fn invalidate(&self, keys: &[String], event: fn(String) -> CacheEvent) {
        for key in keys {
            if let Some(hook) = &self.shared.on_invalidate {
                hook(key.as_str());
            }
            self.publish(event(key.clone()));
        }
    }

    fn publish(&self, event: CacheEvent) {
        // No subscribers is not an error
        let _ = self.shared.events.send(event);
    }
}

// == Weak Cache ==
/// Non-owning reference used by background tasks.
pub(crate) struct WeakCache<V> {
    shared: Weak<Shared<V>>,
}

impl<V> WeakCache<V> {
    pub(crate) fn upgrade(&self) -> Option<AdaptiveCache<V>> {
        self.shared.upgrade().map(|shared| AdaptiveCache { shared })
    }
}

// == Cache Builder ==
/// Builder for an [`AdaptiveCache`] with a custom clock or hooks.
///
/// # Example
///
/// ```
/// use adaptive_cache::cache::CacheBuilder;
/// use adaptive_cache::{AdaptiveCache, CacheConfig, Priority};
///
/// let cache: AdaptiveCache<String> = CacheBuilder::new(CacheConfig::with_capacity(4096))
///     .on_invalidate(|key| println!("drop query for {key}"))
///     .build()
///     .unwrap();
///
/// cache.put("user:1", "Ada".to_string(), Priority::High);
/// assert_eq!(cache.get("user:1").as_deref(), Some("Ada"));
/// ```
pub struct CacheBuilder {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    on_invalidate: Option<InvalidateHook>,
}

impl CacheBuilder {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            on_invalidate: None,
        }
    }

    /// Replaces the time source. Default: [`SystemClock`].
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets the hook called for every evicted or expired key.
    pub fn on_invalidate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_invalidate = Some(Arc::new(hook));
        self
    }

    /// Validates the configuration and builds the cache.
    pub fn build<V>(self) -> Result<AdaptiveCache<V>>
    where
        V: Clone + Serialize + Send + 'static,
    {
        let store = CacheStore::new(self.config.clone(), self.clock)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(AdaptiveCache {
            shared: Arc::new(Shared {
                metrics: store.metrics(),
                store: Mutex::new(store),
                config: self.config,
                on_invalidate: self.on_invalidate,
                events,
            }),
        })
    }
}
