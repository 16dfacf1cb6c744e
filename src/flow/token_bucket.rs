//! Token bucket rate limiter
//!
//! Refill is lazy: the token level is recomputed from elapsed clock time on
//! every `consume()`, no background timer is involved.

use crate::clock::SharedClock;

/// Per-connection token bucket
#[derive(Debug)]
pub struct TokenBucket {
    /// Burst size
    capacity: f64,
    /// Tokens added per second
    refill_per_sec: f64,
    tokens: f64,
    last_refill_ms: u64,
    clock: SharedClock,
}

impl TokenBucket {
    /// Create a full bucket
    pub fn new(capacity: u32, refill_per_sec: f64, clock: SharedClock) -> Self {
        let capacity = f64::from(capacity.max(1));
        let last_refill_ms = clock.now_ms();

        Self {
            capacity,
            refill_per_sec: refill_per_sec.max(0.0),
            tokens: capacity,
            last_refill_ms,
            clock,
        }
    }

    fn refill(&mut self) {
        let now = self.clock.now_ms();
        // A clock that moved backwards refills nothing
        let elapsed_ms = now.saturating_sub(self.last_refill_ms);
        if elapsed_ms > 0 {
            let added = elapsed_ms as f64 * self.refill_per_sec / 1000.0;
            self.tokens = (self.tokens + added).min(self.capacity);
        }
        self.last_refill_ms = now.max(self.last_refill_ms);
    }

    /// Take one token if available
    pub fn consume(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current token level (after refill)
    pub fn tokens(&mut self) -> f64 {
        self.refill();
        self.tokens
    }

    /// Burst size
    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}
