//! Cache Entry Module
//!
//! Defines individual cache entries, their priority tier and size estimate.

use std::fmt;

use serde::{Deserialize, Serialize};

// == Priority ==
/// Priority tier of an entry. Controls both its TTL and its eviction weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// All tiers, highest first.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Entry ==
/// A single cached value with its bookkeeping.
///
/// Everything except `usage_count` is fixed at insertion.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub data: V,
    /// Insertion timestamp (clock milliseconds)
    pub inserted_at: u64,
    /// Priority tier
    pub priority: Priority,
    /// Starts at 1, incremented on every hit
    pub usage_count: u64,
    /// Approximate size used for capacity accounting
    pub size_bytes: usize,
    /// Insertion sequence number, breaks eviction ties
    pub sequence: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry with a usage count of 1.
    pub fn new(data: V, priority: Priority, size_bytes: usize, now: u64, sequence: u64) -> Self {
        Self {
            data,
            inserted_at: now,
            priority,
            usage_count: 1,
            size_bytes,
            sequence,
        }
    }

    // == Age ==
    /// Milliseconds since insertion. Never less than 1.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.inserted_at).max(1)
    }

    // == Is Expired ==
    /// An entry expires once its age is strictly greater than `ttl_ms`.
    pub fn is_expired(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.inserted_at) > ttl_ms
    }

    /// Records a hit.
    pub fn touch(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
    }
}

// == Size Estimate ==
/// Approximates the in-memory footprint of `data`.
///
/// Serializes the value to JSON and doubles the serialized byte length, so a
/// non-ASCII character counts for 4 to 8 bytes. This is a cheap heuristic and
/// not exact memory accounting. Values that cannot be serialized fall back to
/// twice their stack size.
pub fn estimate_size<V: Serialize>(data: &V) -> usize {
    match serde_json::to_string(data) {
        Ok(text) => text.len() * 2,
        Err(_) => std::mem::size_of::<V>() * 2,
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("value".to_string(), Priority::High, 14, 1_000, 0);

        assert_eq!(entry.data, "value");
        assert_eq!(entry.usage_count, 1);
        assert_eq!(entry.inserted_at, 1_000);
        assert_eq!(entry.priority, Priority::High);
    }

    #[test]
    fn test_age_is_floored_at_one() {
        let entry = CacheEntry::new(1u32, Priority::Low, 2, 5_000, 0);
        assert_eq!(entry.age_ms(5_000), 1);
        assert_eq!(entry.age_ms(4_000), 1);
        assert_eq!(entry.age_ms(5_300), 300);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new(1u32, Priority::Low, 2, 0, 0);

        // Expired only when age is strictly greater than the TTL
        assert!(!entry.is_expired(999, 1_000));
        assert!(!entry.is_expired(1_000, 1_000));
        assert!(entry.is_expired(1_001, 1_000));
    }

    #[test]
    fn test_touch_increments_usage() {
        let mut entry = CacheEntry::new(1u32, Priority::Medium, 2, 0, 0);
        entry.touch();
        entry.touch();
        assert_eq!(entry.usage_count, 3);
    }

    #[test]
    fn test_estimate_size_doubles_json_length() {
        // "\"abc\"" is 5 characters
        assert_eq!(estimate_size(&"abc"), 10);
        assert_eq!(estimate_size(&12345u32), 10);
    }

    #[test]
    fn test_estimate_size_counts_utf8_bytes() {
        // "\"é\"" is 3 characters but 4 bytes
        assert_eq!(estimate_size(&"é"), 8);
    }

    #[test]
    fn test_estimate_size_unserializable_falls_back() {
        let mut map: HashMap<(u8, u8), u8> = HashMap::new();
        map.insert((1, 2), 3);
        let expected = std::mem::size_of::<HashMap<(u8, u8), u8>>() * 2;
        assert_eq!(estimate_size(&map), expected);
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(Priority::High.to_string(), "high");
        assert_eq!(Priority::Medium.to_string(), "medium");
    }

    #[test]
    fn test_priority_serde_lowercase() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"high\"");
        let parsed: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, Priority::Low);
    }
}
