//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries and
//! publishes memory usage.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::WeakCache;

// == Sweeper Handle ==
/// Owns the background sweep task. Dropping it stops the sweep.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweep task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    /// True once the task has stopped, either aborted or because the cache
    /// it swept was dropped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns a task that sweeps `cache` every `interval`.
///
/// The task only holds a weak reference between runs, so it exits on its own
/// once every [`AdaptiveCache`](crate::cache::AdaptiveCache) handle is gone.
pub(crate) fn spawn_sweeper<V>(cache: WeakCache<V>, interval: Duration) -> SweeperHandle
where
    V: Clone + Serialize + Send + 'static,
{
    let handle = tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("cache dropped, stopping expiry sweep");
                break;
            };

            let removed = cache.sweep_expired();
            let metrics = cache.metrics();

            if removed > 0 {
                info!(
                    removed,
                    memory_usage_percent = metrics.memory_usage_percent,
                    "expiry sweep removed expired entries"
                );
            } else {
                debug!(
                    memory_usage_percent = metrics.memory_usage_percent,
                    "expiry sweep found no expired entries"
                );
            }
        }
    });

    SweeperHandle { handle }
}

#[cfg(test)]
mod tests {
    use crate::cache::{AdaptiveCache, CacheBuilder, ManualClock, Priority};
    use crate::config::CacheConfig;
    use std::time::Duration;

    fn fast_sweep_cache() -> (AdaptiveCache<String>, ManualClock) {
        let clock = ManualClock::new(0);
        let config = CacheConfig {
            sweep_interval: Duration::from_millis(20),
            ..CacheConfig::with_capacity(10_000)
        };
        let cache = CacheBuilder::new(config)
            .clock(clock.clone())
            .build()
            .unwrap();
        (cache, clock)
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let (cache, clock) = fast_sweep_cache();

        cache.put("expire_soon", "value".to_string(), Priority::Low);
        cache.put("long_lived", "value".to_string(), Priority::High);
        clock.advance(5 * 60 * 1000 + 1);

        let sweeper = cache.start_sweeper();
        tokio::time::sleep(Duration::from_millis(150)).await;

        // Removed without any read touching it
        assert_eq!(cache.keys(), vec!["long_lived".to_string()]);
        let metrics = cache.metrics();
        assert_eq!(metrics.expirations, 1);
        assert_eq!(metrics.total_queries, 0);

        sweeper.shutdown();
    }

    #[tokio::test]
    async fn test_sweeper_preserves_valid_entries() {
        let (cache, _clock) = fast_sweep_cache();

        cache.put("long_lived", "value".to_string(), Priority::Medium);
        let _sweeper = cache.start_sweeper();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.get("long_lived"), Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_sweeper_can_be_aborted() {
        let (cache, _clock) = fast_sweep_cache();

        let sweeper = cache.start_sweeper();
        sweeper.shutdown();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sweeper.is_finished(), "Task should be finished after abort");
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_cache_dropped() {
        let (cache, _clock) = fast_sweep_cache();

        let sweeper = cache.start_sweeper();
        drop(cache);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(sweeper.is_finished(), "Task should exit once the cache is gone");
    }
}
