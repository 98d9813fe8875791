//! Prefetch Module
//!
//! Best-effort speculative loading of keys that are not cached yet.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::cache::{AdaptiveCache, Priority};
use crate::error::{CacheError, Result};

// == Prefetch Report ==
/// Outcome of one prefetch batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    /// Keys passed in, duplicates included
    pub requested: usize,
    /// Keys not loaded because they were already cached, duplicated, or
    /// written by someone else while the loader ran
    pub skipped: usize,
    /// Keys loaded and inserted
    pub loaded: usize,
    /// Keys whose loader returned an error or panicked
    pub failed: usize,
}

impl<V> AdaptiveCache<V>
where
    V: Clone + Serialize + Send + 'static,
{
    // == Prefetch ==
    /// Loads every key in `keys` that is not freshly cached and inserts the
    /// results with [`Priority::Low`].
    ///
    /// See [`prefetch_with_priority`](Self::prefetch_with_priority).
    pub fn prefetch<I, K, F, Fut>(
        &self,
        keys: I,
        loader: F,
    ) -> Result<JoinHandle<PrefetchReport>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.prefetch_with_priority(keys, loader, Priority::Low)
    }

    /// Loads every key in `keys` that is not freshly cached and inserts the
    /// results with `priority`.
    ///
    /// Presence is checked when this is called; expired entries count as
    /// absent. Each loader runs as its own task, concurrently with the others
    /// and with ordinary reads and writes. A result is inserted only if the
    /// key is still absent when the loader finishes, so data written in the
    /// meantime is never overwritten. A failing loader is logged and skipped.
    ///
    /// Awaiting the returned handle is optional and yields a [`PrefetchReport`]
    /// once every load has settled. Outside a tokio runtime nothing is loaded
    /// and [`CacheError::Internal`] is returned.
    pub fn prefetch_with_priority<I, K, F, Fut>(
        &self,
        keys: I,
        loader: F,
        priority: Priority,
    ) -> Result<JoinHandle<PrefetchReport>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            warn!(error = %err, "prefetch called outside a tokio runtime, skipping batch");
            CacheError::Internal(format!("prefetch requires a tokio runtime: {}", err))
        })?;

        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let requested = keys.len();

        let mut seen = HashSet::with_capacity(requested);
        let pending: Vec<String> = keys
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .filter(|key| !self.contains(key))
            .collect();

        let mut report = PrefetchReport {
            requested,
            skipped: requested - pending.len(),
            ..PrefetchReport::default()
        };

        let cache = self.clone();
        let loader = Arc::new(loader);

        Ok(runtime.spawn(async move {
            let mut loads = JoinSet::new();
            for key in pending {
                let loader = Arc::clone(&loader);
                loads.spawn(async move {
                    let result = loader(key.clone()).await;
                    (key, result)
                });
            }

            while let Some(joined) = loads.join_next().await {
                match joined {
                    Ok((key, Ok(data))) => {
                        if cache.put_if_absent(key.clone(), data, priority) {
                            report.loaded += 1;
                        } else {
                            debug!(key = %key, "prefetched key was written meanwhile, keeping it");
                            report.skipped += 1;
                        }
                    }
                    Ok((key, Err(err))) => {
                        warn!(key = %key, error = %err, "prefetch loader failed");
                        report.failed += 1;
                    }
                    Err(err) => {
                        warn!(error = %err, "prefetch loader task did not complete");
                        report.failed += 1;
                    }
                }
            }

            info!(
                requested = report.requested,
                loaded = report.loaded,
                skipped = report.skipped,
                failed = report.failed,
                "prefetch batch settled"
            );
            report
        }))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn cache() -> AdaptiveCache<String> {
        AdaptiveCache::new(CacheConfig::with_capacity(100_000)).unwrap()
    }

    #[tokio::test]
    async fn test_prefetch_loads_missing_keys_with_low_priority() {
        let cache = cache();

        let report = cache
            .prefetch(["a", "b"], |key| async move { anyhow::Ok(format!("loaded-{}", key)) })
            .unwrap()
            .await
            .unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(cache.get("a"), Some("loaded-a".to_string()));
        assert_eq!(cache.get("b"), Some("loaded-b".to_string()));
    }

    #[tokio::test]
    async fn test_prefetch_uses_requested_priority() {
        let cache = cache();
        let mut events = cache.subscribe();

        cache
            .prefetch_with_priority(["k"], |_| async { anyhow::Ok("v".to_string()) }, Priority::High)
            .unwrap()
            .await
            .unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            crate::cache::CacheEvent::Inserted {
                key: "k".to_string(),
                priority: Priority::High
            }
        );
    }

    #[tokio::test]
    async fn test_prefetch_never_overwrites_present_key() {
        let cache = cache();
        cache.put("k", "fresh".to_string(), Priority::Medium);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let report = cache
            .prefetch(["k"], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok("stale".to_string()) }
            })
            .unwrap()
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.get("k"), Some("fresh".to_string()));
    }

    #[tokio::test]
    async fn test_prefetch_isolates_failures() {
        let cache = cache();

        let report = cache
            .prefetch(["bad", "good"], |key| async move {
                if key == "bad" {
                    Err(anyhow!("backend unavailable"))
                } else {
                    Ok("ok".to_string())
                }
            })
            .unwrap()
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.loaded, 1);
        assert!(!cache.contains("bad"));
        assert_eq!(cache.get("good"), Some("ok".to_string()));
    }

    #[tokio::test]
    async fn test_prefetch_survives_panicking_loader() {
        let cache = cache();

        let report = cache
            .prefetch(["boom", "fine"], |key| async move {
                if key == "boom" {
                    panic!("loader bug");
                }
                anyhow::Ok("ok".to_string())
            })
            .unwrap()
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(cache.contains("fine"));
    }

    #[tokio::test]
    async fn test_prefetch_deduplicates_keys() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let report = cache
            .prefetch(["k", "k", "k"], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok("v".to_string()) }
            })
            .unwrap()
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            report,
            PrefetchReport {
                requested: 3,
                skipped: 2,
                loaded: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_prefetch_does_not_hold_lock_while_loading() {
        let cache = cache();
        let inner = cache.clone();

        // A loader that reads the cache would deadlock if the lock were held
        let report = cache
            .prefetch(["k"], move |_| {
                let inner = inner.clone();
                async move {
                    let _ = inner.get("other");
                    anyhow::Ok("v".to_string())
                }
            })
            .unwrap()
            .await
            .unwrap();

        assert_eq!(report.loaded, 1);
    }

    #[test]
    fn test_prefetch_outside_runtime_fails_softly() {
        let cache = cache();

        let result = cache.prefetch(["k"], |_| async { anyhow::Ok("v".to_string()) });

        assert!(matches!(result, Err(CacheError::Internal(_))));
        assert!(!cache.contains("k"));
    }

    #[tokio::test]
    async fn test_slow_loader_does_not_delay_others() {
        let cache = cache();

        let batch = cache.prefetch(["slow", "fast"], |key| async move {
            if key == "slow" {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            anyhow::Ok(key)
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.contains("fast"));
        assert!(!cache.contains("slow"));

        let report = batch.await.unwrap();
        assert_eq!(report.loaded, 2);
        assert!(cache.contains("slow"));
    }

    #[tokio::test]
    async fn test_prefetch_keeps_value_written_during_load() {
        let cache = cache();
        let writer = cache.clone();

        let report = cache
            .prefetch(["k"], move |key| {
                let writer = writer.clone();
                async move {
                    writer.put(key, "explicit".to_string(), Priority::High);
                    anyhow::Ok("speculative".to_string())
                }
            })
            .unwrap()
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(cache.get("k"), Some("explicit".to_string()));
    }
}
