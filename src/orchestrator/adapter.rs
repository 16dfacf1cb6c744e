//! Transport adapter contract
//!
//! The orchestrator delivers frames through a [`PushAdapter`]; the transport
//! (SSE writer, test double, ...) implements it. A disconnected client is a
//! routine outcome, so it is reported as [`SendOutcome::Error`] rather than
//! raised.

use async_trait::async_trait;

use crate::frame::OutboundFrame;

/// Result of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered
    Success,
    /// Delivered, but the write was slow; drives backoff
    Slow,
    /// Delivery failed; the connection will be removed
    Error,
}

/// Transport-facing delivery contract
#[async_trait]
pub trait PushAdapter: Send + Sync {
    /// Deliver one frame
    async fn send(&self, frame: &OutboundFrame) -> SendOutcome;

    /// Whether the underlying connection is still open
    fn is_connected(&self) -> bool;

    /// Stable connection id
    fn connection_id(&self) -> &str;
}
