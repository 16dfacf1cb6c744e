//! Hub client records

use tokio::sync::mpsc;

use super::filter::ClientFilter;
use crate::flow::TokenBucket;
use crate::stats::ClientStats;
use crate::wire::SseEvent;

/// Hub-side state for one client
#[derive(Debug)]
pub(crate) struct ClientRecord {
    pub(crate) tx: mpsc::Sender<SseEvent>,
    pub(crate) connected_at: u64,
    pub(crate) last_heartbeat: u64,
    pub(crate) active: bool,
    pub(crate) filter: Option<ClientFilter>,
    pub(crate) stats: ClientStats,
    pub(crate) control_bucket: TokenBucket,
}

impl ClientRecord {
    /// Whether the client has gone stale at `now`
    pub(crate) fn is_expired(&self, now: u64, timeout_ms: u64) -> bool {
        self.last_heartbeat.saturating_add(timeout_ms) < now
    }
}

/// Receiving end of a client's event stream
///
/// Yields SSE events. Ends once the hub removes the client.
#[derive(Debug)]
pub struct ClientStream {
    id: String,
    rx: mpsc::Receiver<SseEvent>,
}

impl ClientStream {
    pub(crate) fn new(id: String, rx: mpsc::Receiver<SseEvent>) -> Self {
        Self { id, rx }
    }

    /// Client id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<SseEvent> {
        self.rx.recv().await
    }

    /// Take an event if one is queued
    pub fn try_recv(&mut self) -> Option<SseEvent> {
        self.rx.try_recv().ok()
    }

    /// Hand over the underlying receiver
    pub fn into_receiver(self) -> mpsc::Receiver<SseEvent> {
        self.rx
    }

    /// Drain everything queued right now
    pub fn drain(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
