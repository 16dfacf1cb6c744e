//! Hub messages and lifecycle notifications

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::filter::FilterInput;
use crate::wire::{SseEvent, SseEventKind};

/// A structured log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: u64,
    pub level: String,
    pub branch: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
}

impl LogEvent {
    /// Create a log event without extra fields
    pub fn new(
        ts: u64,
        level: impl Into<String>,
        branch: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ts,
            level: level.into(),
            branch: branch.into(),
            message: message.into(),
            fields: None,
        }
    }

    /// Attach structured fields
    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = Some(fields);
        self
    }

    pub(crate) fn filter_input(&self) -> FilterInput<'_> {
        FilterInput {
            level: &self.level,
            branch: &self.branch,
            message: &self.message,
        }
    }
}

/// Message fanned out to hub clients
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Filtered per client
    Log(LogEvent),
    /// Keepalive, never filtered
    Heartbeat,
    /// Stream-opened greeting
    Ready,
}

impl HubMessage {
    /// Build the SSE event delivered to `client_id`
    pub(crate) fn to_event(&self, client_id: &str, now_ms: u64) -> serde_json::Result<SseEvent> {
        let event = match self {
            HubMessage::Log(event) => {
                SseEvent::new(SseEventKind::Log, serde_json::to_string(event)?, event.ts)
            }
            HubMessage::Heartbeat => SseEvent::new(
                SseEventKind::Heartbeat,
                json!({ "ts": now_ms }).to_string(),
                now_ms,
            ),
            HubMessage::Ready => SseEvent::new(
                SseEventKind::Ready,
                json!({ "client": client_id, "ts": now_ms }).to_string(),
                now_ms,
            ),
        };
        Ok(event)
    }
}

/// Client lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A client was added
    ClientConnected { id: String },
    /// A client was removed, with how long it was connected
    ClientDisconnected { id: String, duration: Duration },
}
