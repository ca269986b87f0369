//! Popularity tracking for promotion decisions.
//!
//! Counts successful generations per key. Once a key's count reaches the
//! promotion threshold it becomes eligible for the promotion cache, unless a
//! recent budget rejection put it in a cooldown window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::cache::record::CacheKey;

/// Per-key access counters with a threshold gate and rejection cooldowns.
///
/// Counters only ever increase; the sole way down is an explicit [`reset`].
/// Whether the key is already resident in the promotion cache is the
/// coordinator's side of the check — the tracker never sees tier contents.
///
/// [`reset`]: PopularityTracker::reset
#[derive(Debug)]
pub struct PopularityTracker {
    counts: HashMap<CacheKey, u64>,
    cooldowns: HashMap<CacheKey, Instant>,
    threshold: u64,
    cooldown_window: Duration,
}

impl PopularityTracker {
    pub fn new(threshold: u64, cooldown_window: Duration) -> Self {
        Self {
            counts: HashMap::new(),
            cooldowns: HashMap::new(),
            threshold,
            cooldown_window,
        }
    }

    /// Increment the key's counter and return the new count.
    pub fn record_access(&mut self, key: &CacheKey) -> u64 {
        let count = self.counts.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, key: &CacheKey) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Whether the key has crossed the promotion threshold and is outside any
    /// cooldown window.
    pub fn should_promote(&mut self, key: &CacheKey) -> bool {
        if self.count(key) < self.threshold {
            return false;
        }
        match self.cooldowns.get(key) {
            Some(until) if Instant::now() < *until => false,
            Some(_) => {
                // Expired; drop it so the map does not accumulate dead keys.
                self.cooldowns.remove(key);
                true
            }
            None => true,
        }
    }

    /// Start the key's cooldown window after a rejected promotion attempt.
    pub fn start_cooldown(&mut self, key: &CacheKey) {
        self.cooldowns
            .insert(key.clone(), Instant::now() + self.cooldown_window);
    }

    /// Drop all counters and cooldowns.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.cooldowns.clear();
    }

    pub fn tracked_keys(&self) -> usize {
        self.counts.len()
    }
}
