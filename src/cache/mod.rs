//! Cache Module
//!
//! Bounded in-memory caching with priority-tiered TTL expiry, score-based
//! eviction, prefetching and hit/miss metrics.

mod clock;
mod entry;
mod eviction;
mod handle;
mod metrics;
mod prefetch;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::{estimate_size, CacheEntry, Priority};
pub use eviction::EvictionPolicy;
pub use handle::{AdaptiveCache, CacheBuilder, CacheEvent, InvalidateHook};
pub(crate) use handle::WeakCache;
pub use metrics::{CacheMetrics, MetricsRecorder};
pub use prefetch::PrefetchReport;
pub use store::{CacheStore, Lookup};
