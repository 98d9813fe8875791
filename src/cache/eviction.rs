//! Eviction Policy Module
//!
//! Scores entries by usage, priority and age, and ranks them for reclamation.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::cache::CacheEntry;
use crate::config::PriorityWeights;

// == Eviction Policy ==
/// Usefulness scoring for reclamation.
///
/// `score = usage_count * priority_weight / age_ms`, with age floored at 1ms.
/// Old, rarely used, low-priority entries score lowest and go first; a
/// frequently used or high-priority entry survives longer as it ages.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictionPolicy {
    weights: PriorityWeights,
}

impl EvictionPolicy {
    // == Constructor ==
    pub fn new(weights: PriorityWeights) -> Self {
        Self { weights }
    }

    // == Score ==
    /// Computes the usefulness score of `entry` at time `now`.
    pub fn score<V>(&self, entry: &CacheEntry<V>, now: u64) -> f64 {
        let weight = self.weights.get(entry.priority) as f64;
        (entry.usage_count as f64 * weight) / entry.age_ms(now) as f64
    }

    // == Rank ==
    /// Returns every key ordered from first to last eviction candidate.
    ///
    /// Ascending by score; equal scores fall back to insertion order, oldest
    /// first.
    pub fn rank<V>(&self, entries: &HashMap<String, CacheEntry<V>>, now: u64) -> Vec<String> {
        let mut scored: Vec<(f64, u64, &String)> = entries
            .iter()
            .map(|(key, entry)| (self.score(entry, now), entry.sequence, key))
            .collect();

        scored.sort_by(|a, b| match a.0.total_cmp(&b.0) {
            Ordering::Equal => a.1.cmp(&b.1),
            other => other,
        });

        scored.into_iter().map(|(_, _, key)| key.clone()).collect()
    }
}
