//! Per-connection delivery state
//!
//! Owned by the orchestrator, one per transport connection. The ring buffer
//! and token bucket belong to this connection alone, so a slow client only
//! throttles itself.

use std::sync::Arc;

use super::adapter::PushAdapter;
use super::config::OrchestratorConfig;
use crate::clock::SharedClock;
use crate::flow::{RingBuffer, RingBufferStats, TokenBucket};
use crate::frame::OutboundFrame;

/// State for a single connection
pub struct ConnectionState {
    /// Delivery adapter
    pub(super) adapter: Arc<dyn PushAdapter>,

    /// Pending frames, oldest first
    pub(super) buffer: RingBuffer<OutboundFrame>,

    /// Send rate limiter
    pub(super) bucket: TokenBucket,

    /// Current backoff (0 = none)
    pub(super) backoff_ms: u64,

    /// Time of the last flush attempt
    pub(super) last_flush_ms: u64,

    /// Earliest time the next flush may run
    pub(super) next_flush_ms: u64,

    /// Set when a send failed; removed at the end of the tick
    pub(super) failed: bool,
}

impl ConnectionState {
    pub(super) fn new(
        adapter: Arc<dyn PushAdapter>,
        config: &OrchestratorConfig,
        clock: SharedClock,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            adapter,
            buffer: RingBuffer::new(config.buffer_capacity),
            bucket: TokenBucket::new(config.bucket_capacity, config.refill_per_sec, clock),
            backoff_ms: 0,
            last_flush_ms: 0,
            next_flush_ms: now,
            failed: false,
        }
    }

    /// Queue a frame; returns true if an older frame was dropped
    pub(super) fn enqueue(&mut self, frame: OutboundFrame) -> bool {
        self.buffer.enqueue(frame).is_some()
    }

    /// Whether the flush schedule allows sending at `now`
    pub(super) fn is_due(&self, now: u64) -> bool {
        now >= self.next_flush_ms
    }

    /// Update backoff after a flush; returns true if backoff grew
    pub(super) fn update_backoff(
        &mut self,
        saw_slow: bool,
        now: u64,
        config: &OrchestratorConfig,
    ) -> bool {
        if saw_slow {
            let grown = (self.backoff_ms as f64 * config.backoff_multiplier) as u64;
            self.backoff_ms = grown
                .max(config.min_backoff_ms)
                .min(config.max_backoff_ms);
            self.next_flush_ms = now + self.backoff_ms;
            true
        } else {
            self.backoff_ms = 0;
            self.next_flush_ms = now;
            false
        }
    }

    /// Whether this connection should be removed after the tick
    pub(super) fn should_remove(&self) -> bool {
        self.failed || !self.adapter.is_connected()
    }

    pub(super) fn snapshot(&mut self, id: &str) -> ConnectionSnapshot {
        ConnectionSnapshot {
            id: id.to_string(),
            backoff_ms: self.backoff_ms,
            last_flush_ms: self.last_flush_ms,
            next_flush_ms: self.next_flush_ms,
            buffer: self.buffer.stats(),
            tokens: self.bucket.tokens(),
        }
    }
}

/// Diagnostic view of a connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    /// Connection id
    pub id: String,
    /// Current backoff
    pub backoff_ms: u64,
    /// Time of the last flush attempt (0 if never)
    pub last_flush_ms: u64,
    /// Earliest next flush
    pub next_flush_ms: u64,
    /// Buffer statistics
    pub buffer: RingBufferStats,
    /// Available tokens
    pub tokens: f64,
}
