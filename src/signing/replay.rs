//! Bounded replay-detection cache
//!
//! Remembers recently accepted envelopes by `(kid, nonce, sig)`. Entries
//! expire after the TTL and the oldest entry is evicted once the cache is
//! full, so memory stays bounded no matter how many frames arrive.

use std::collections::{HashSet, VecDeque};

/// Default number of remembered envelopes
pub const DEFAULT_REPLAY_CACHE_SIZE: usize = 4096;

/// Replay cache
#[derive(Debug)]
pub struct ReplayCache {
    capacity: usize,
    ttl_ms: u64,
    /// Insertion order with insertion time
    order: VecDeque<(String, u64)>,
    seen: HashSet<String>,
}

impl ReplayCache {
    /// Create a cache remembering up to `capacity` entries for `ttl_ms`
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl_ms,
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    fn key(kid: &str, nonce: &str, sig: &str) -> String {
        format!("{}|{}|{}", kid, nonce, sig)
    }

    fn evict_expired(&mut self, now_ms: u64) {
        while let Some((_, inserted)) = self.order.front() {
            if now_ms.saturating_sub(*inserted) <= self.ttl_ms {
                break;
            }
            if let Some((key, _)) = self.order.pop_front() {
                self.seen.remove(&key);
            }
        }
    }

    /// Record an envelope; returns `false` if it was already seen
    pub fn check_and_insert(&mut self, kid: &str, nonce: &str, sig: &str, now_ms: u64) -> bool {
        self.evict_expired(now_ms);

        let key = Self::key(kid, nonce, sig);
        if self.seen.contains(&key) {
            return false;
        }

        while self.order.len() >= self.capacity {
            if let Some((old, _)) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }

        self.seen.insert(key.clone());
        self.order.push_back((key, now_ms));
        true
    }

    /// Number of remembered envelopes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if nothing is remembered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
