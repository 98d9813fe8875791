//! Configuration Module
//!
//! Cache tuning parameters, loaded from environment variables or built in code,
//! and validated before a cache is constructed.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::Priority;
use crate::error::{CacheError, Result};

/// Default capacity: 50 MiB.
pub const DEFAULT_CAPACITY_BYTES: usize = 50 * 1024 * 1024;

/// Default fraction of capacity that reclamation shrinks the store to.
pub const DEFAULT_RECLAIM_RATIO: f64 = 0.8;

// == TTL Table ==
/// Time-to-live for each priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlTable {
    pub high: Duration,
    pub medium: Duration,
    pub low: Duration,
}

impl TtlTable {
    /// Returns the TTL for `priority`.
    pub fn get(&self, priority: Priority) -> Duration {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    /// Returns the TTL for `priority` in milliseconds.
    pub fn get_ms(&self, priority: Priority) -> u64 {
        self.get(priority).as_millis() as u64
    }
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            high: Duration::from_secs(30 * 60),
            medium: Duration::from_secs(15 * 60),
            low: Duration::from_secs(5 * 60),
        }
    }
}

// == Priority Weights ==
/// Eviction-score multiplier for each priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityWeights {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl PriorityWeights {
    pub fn get(&self, priority: Priority) -> u32 {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            high: 3,
            medium: 2,
            low: 1,
        }
    }
}

// == Cache Config ==
/// Parameters for a single cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Soft size budget in bytes
    pub capacity_bytes: usize,
    /// TTL per priority tier
    pub ttl_by_priority: TtlTable,
    /// Interval between background expiry sweeps
    pub sweep_interval: Duration,
    /// Eviction-score weight per priority tier
    pub priority_weights: PriorityWeights,
    /// Reclamation stops once the store is at or below this fraction of capacity
    pub reclaim_ratio: f64,
}

impl CacheConfig {
    /// Creates a config with default values and the given capacity.
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            ..Self::default()
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY_BYTES` - Size budget (default: 52428800)
    /// - `CACHE_TTL_HIGH_SECS` - High tier TTL (default: 1800)
    /// - `CACHE_TTL_MEDIUM_SECS` - Medium tier TTL (default: 900)
    /// - `CACHE_TTL_LOW_SECS` - Low tier TTL (default: 300)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep interval (default: 60000)
    /// - `CACHE_WEIGHT_HIGH` / `CACHE_WEIGHT_MEDIUM` / `CACHE_WEIGHT_LOW` (default: 3 / 2 / 1)
    /// - `CACHE_RECLAIM_RATIO` - Reclaim target fraction (default: 0.8)
    ///
    /// Unparseable values fall back to their default. Call [`validate`](Self::validate)
    /// to reject out-of-range values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ttl = defaults.ttl_by_priority;
        let weights = defaults.priority_weights;

        Self {
            capacity_bytes: env_or("CACHE_CAPACITY_BYTES", defaults.capacity_bytes),
            ttl_by_priority: TtlTable {
                high: Duration::from_secs(env_or("CACHE_TTL_HIGH_SECS", ttl.high.as_secs())),
                medium: Duration::from_secs(env_or("CACHE_TTL_MEDIUM_SECS", ttl.medium.as_secs())),
                low: Duration::from_secs(env_or("CACHE_TTL_LOW_SECS", ttl.low.as_secs())),
            },
            sweep_interval: Duration::from_millis(env_or(
                "CACHE_SWEEP_INTERVAL_MS",
                defaults.sweep_interval.as_millis() as u64,
            )),
            priority_weights: PriorityWeights {
                high: env_or("CACHE_WEIGHT_HIGH", weights.high),
                medium: env_or("CACHE_WEIGHT_MEDIUM", weights.medium),
                low: env_or("CACHE_WEIGHT_LOW", weights.low),
            },
            reclaim_ratio: env_or("CACHE_RECLAIM_RATIO", defaults.reclaim_ratio),
        }
    }

    // == Validate ==
    /// Rejects configurations the cache cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity_bytes must be greater than zero".to_string(),
            ));
        }

        for priority in Priority::ALL {
            if self.ttl_by_priority.get(priority).is_zero() {
                return Err(CacheError::InvalidConfig(format!(
                    "TTL for {} priority must be greater than zero",
                    priority
                )));
            }
            if self.priority_weights.get(priority) == 0 {
                return Err(CacheError::InvalidConfig(format!(
                    "weight for {} priority must be greater than zero",
                    priority
                )));
            }
        }

        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }

        if !(self.reclaim_ratio > 0.0 && self.reclaim_ratio <= 1.0) {
            return Err(CacheError::InvalidConfig(format!(
                "reclaim_ratio must be in (0, 1], got {}",
                self.reclaim_ratio
            )));
        }

        Ok(())
    }

    /// Size the store is shrunk to when reclamation runs.
    pub fn reclaim_target_bytes(&self) -> usize {
        (self.capacity_bytes as f64 * self.reclaim_ratio) as usize
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            ttl_by_priority: TtlTable::default(),
            sweep_interval: Duration::from_millis(60_000),
            priority_weights: PriorityWeights::default(),
            reclaim_ratio: DEFAULT_RECLAIM_RATIO,
        }
    }
}

// == Server Config ==
/// Configuration for the demo host binary.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Cache parameters
    pub cache: CacheConfig,
    /// HTTP server port (default: 3000)
    pub server_port: u16,
}

impl Config {
    /// Loads cache settings plus `SERVER_PORT` from the environment.
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            server_port: env_or("SERVER_PORT", 3000),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity_bytes, 50 * 1024 * 1024);
        assert_eq!(config.ttl_by_priority.high, Duration::from_secs(1800));
        assert_eq!(config.ttl_by_priority.medium, Duration::from_secs(900));
        assert_eq!(config.ttl_by_priority.low, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.priority_weights, PriorityWeights { high: 3, medium: 2, low: 1 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "CACHE_CAPACITY_BYTES",
            "CACHE_TTL_HIGH_SECS",
            "CACHE_TTL_MEDIUM_SECS",
            "CACHE_TTL_LOW_SECS",
            "CACHE_SWEEP_INTERVAL_MS",
            "CACHE_WEIGHT_HIGH",
            "CACHE_WEIGHT_MEDIUM",
            "CACHE_WEIGHT_LOW",
            "CACHE_RECLAIM_RATIO",
            "SERVER_PORT",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.cache.capacity_bytes, DEFAULT_CAPACITY_BYTES);
        assert_eq!(config.cache.ttl_by_priority, TtlTable::default());
        assert_eq!(config.cache.sweep_interval, Duration::from_millis(60_000));
        assert_eq!(config.cache.priority_weights, PriorityWeights::default());
        assert_eq!(config.cache.reclaim_ratio, DEFAULT_RECLAIM_RATIO);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_env_or_parses_or_falls_back() {
        // Names only this test touches
        env::set_var("ADAPTIVE_CACHE_TEST_WEIGHT", "not-a-number");
        env::set_var("ADAPTIVE_CACHE_TEST_RATIO", "0.5");
        env::remove_var("ADAPTIVE_CACHE_TEST_UNSET");

        assert_eq!(env_or("ADAPTIVE_CACHE_TEST_WEIGHT", 3u32), 3);
        assert_eq!(env_or("ADAPTIVE_CACHE_TEST_RATIO", DEFAULT_RECLAIM_RATIO), 0.5);
        assert_eq!(env_or("ADAPTIVE_CACHE_TEST_UNSET", 42u16), 42);

        env::set_var("ADAPTIVE_CACHE_TEST_WEIGHT", "7");
        assert_eq!(env_or("ADAPTIVE_CACHE_TEST_WEIGHT", 3u32), 7);

        env::remove_var("ADAPTIVE_CACHE_TEST_WEIGHT");
        env::remove_var("ADAPTIVE_CACHE_TEST_RATIO");
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = CacheConfig::with_capacity(0);
        assert!(matches!(config.validate(), Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = CacheConfig::default();
        config.ttl_by_priority.medium = Duration::ZERO;
        assert!(matches!(config.validate(), Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_weight() {
        let mut config = CacheConfig::default();
        config.priority_weights.low = 0;
        assert!(matches!(config.validate(), Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_reclaim_ratio() {
        let mut config = CacheConfig::default();
        config.reclaim_ratio = 1.5;
        assert!(config.validate().is_err());
        config.reclaim_ratio = 0.0;
        assert!(config.validate().is_err());
        config.reclaim_ratio = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reclaim_target_bytes() {
        let config = CacheConfig::with_capacity(1000);
        assert_eq!(config.reclaim_target_bytes(), 800);
    }

    #[test]
    fn test_ttl_table_lookup() {
        let table = TtlTable::default();
        assert_eq!(table.get_ms(Priority::Low), 300_000);
        assert_eq!(table.get(Priority::High), Duration::from_secs(1800));
    }
}
