//! SSE push adapter
//!
//! Bridges the orchestrator to a connection's response stream through a
//! bounded event channel. Write latency is the time the channel takes to accept the
//! event, so a client that stops reading shows up as `Slow` once the channel
//! fills and as `Error` once the send times out or the writer is gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::frame::OutboundFrame;
use crate::orchestrator::{PushAdapter, SendOutcome};
use crate::wire::SseEvent;

/// [`PushAdapter`] writing SSE events into a channel
#[derive(Debug)]
pub struct SseAdapter {
    id: String,
    tx: mpsc::Sender<SseEvent>,
    slow_threshold: Duration,
    send_timeout: Duration,
    connected: AtomicBool,
}

impl SseAdapter {
    /// Create an adapter and the receiver its response stream drains
    pub fn channel(
        id: impl Into<String>,
        capacity: usize,
        slow_threshold: Duration,
        send_timeout: Duration,
    ) -> (Self, mpsc::Receiver<SseEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let adapter = Self {
            id: id.into(),
            tx,
            slow_threshold,
            send_timeout,
            connected: AtomicBool::new(true),
        };
        (adapter, rx)
    }

    fn mark_closed(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }
}

#[async_trait]
impl PushAdapter for SseAdapter {
    async fn send(&self, frame: &OutboundFrame) -> SendOutcome {
        let event = match SseEvent::for_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(connection = %self.id, error = %e, "Failed to encode frame");
                return SendOutcome::Error;
            }
        };

        let started = Instant::now();
        match tokio::time::timeout(self.send_timeout, self.tx.send(event)).await {
            Ok(Ok(())) => {
                if started.elapsed() > self.slow_threshold {
                    SendOutcome::Slow
                } else {
                    SendOutcome::Success
                }
            }
            Ok(Err(_)) => {
                self.mark_closed();
                SendOutcome::Error
            }
            Err(_) => {
                tracing::debug!(connection = %self.id, "Send timed out");
                self.mark_closed();
                SendOutcome::Error
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed) && !self.tx.is_closed()
    }

    fn connection_id(&self) -> &str {
        &self.id
    }
}
