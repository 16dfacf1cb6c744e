//! Server-Sent Events
//!
//! ```text
//! event: <type>\n
//! data: <json>\n
//! id: <timestamp>\n
//! \n
//! ```
//!
//! [`SseEvent`] is what the hub and the push adapters queue per client. The
//! server turns it into an [`axum::response::sse::Event`], which owns the
//! line framing.

use axum::response::sse::Event;

use crate::frame::{OutboundFrame, PushFrame};

/// Event type names on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SseEventKind {
    /// Log or push frame
    Log,
    /// Keepalive
    Heartbeat,
    /// Sent once when a stream opens
    Ready,
}

impl SseEventKind {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            SseEventKind::Log => "log",
            SseEventKind::Heartbeat => "heartbeat",
            SseEventKind::Ready => "ready",
        }
    }

    /// Event type for a push frame: heartbeats map to `heartbeat`,
    /// everything else to `log`
    pub fn for_frame(frame: &PushFrame) -> Self {
        if frame.is_heartbeat() {
            SseEventKind::Heartbeat
        } else {
            SseEventKind::Log
        }
    }
}

impl std::fmt::Display for SseEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event queued for a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    kind: SseEventKind,
    data: String,
    id: u64,
}

impl SseEvent {
    /// Create an event
    pub fn new(kind: SseEventKind, data: impl Into<String>, id: u64) -> Self {
        Self {
            kind,
            data: data.into(),
            id,
        }
    }

    /// Event for an orchestrator frame, identified by its timestamp
    pub fn for_frame(frame: &OutboundFrame) -> serde_json::Result<Self> {
        Ok(Self::new(
            SseEventKind::for_frame(frame.frame()),
            frame.to_json()?,
            frame.ts(),
        ))
    }

    /// Event type
    pub fn kind(&self) -> SseEventKind {
        self.kind
    }

    /// JSON payload
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Event id
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl From<SseEvent> for Event {
    fn from(event: SseEvent) -> Self {
        Event::default()
            .event(event.kind.as_str())
            .data(event.data)
            .id(event.id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use axum::response::sse::Sse;
    use axum::response::IntoResponse;

    use super::*;

    async fn render(events: Vec<SseEvent>) -> String {
        let stream = tokio_stream::iter(events.into_iter().map(|e| Ok::<_, Infallible>(Event::from(e))));
        let response = Sse::new(stream).into_response();
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_event_layout() {
        let text = render(vec![SseEvent::new(
            SseEventKind::Ready,
            r#"{"client":"a"}"#,
            42,
        )])
        .await;
        assert_eq!(text, "event: ready\ndata: {\"client\":\"a\"}\nid: 42\n\n");
    }

    #[tokio::test]
    async fn test_multiline_data_split() {
        let text = render(vec![SseEvent::new(SseEventKind::Log, "one\ntwo", 1)]).await;
        assert_eq!(text, "event: log\ndata: one\ndata: two\nid: 1\n\n");
    }

    #[test]
    fn test_frame_kind_mapping() {
        let hb = SseEvent::for_frame(&OutboundFrame::from(PushFrame::heartbeat(7))).unwrap();
        assert_eq!(hb.kind(), SseEventKind::Heartbeat);
        assert_eq!(hb.data(), r#"{"t":"hb","ts":7}"#);
        assert_eq!(hb.id(), 7);

        let tm = SseEvent::for_frame(&OutboundFrame::from(PushFrame::telemetry(8, 0.5, 1024)))
            .unwrap();
        assert_eq!(tm.kind(), SseEventKind::Log);
        assert_eq!(tm.id(), 8);
    }
}
