//! Adaptive Cache - a bounded in-memory cache manager
//!
//! Entries carry a priority tier that sets both their time-to-live and their
//! weight in eviction scoring. When a write would exceed the size budget, the
//! least useful entries (rarely used, old, low priority) are evicted first.
//! A background sweep reclaims expired entries, and a prefetcher loads keys
//! speculatively through a caller-supplied loader.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{AdaptiveCache, CacheEvent, CacheMetrics, PrefetchReport, Priority};
pub use config::{CacheConfig, Config, PriorityWeights, TtlTable};
pub use error::{CacheError, Result};
pub use tasks::SweeperHandle;
