//! Push frame types
//!
//! A [`PushFrame`] is the small, timestamped value an emitter produces. The
//! orchestrator queues [`OutboundFrame`]s, which are either the plain frame
//! or the frame wrapped in a signed envelope.

use serde::{Deserialize, Serialize};

use crate::signing::SignedFrame;

/// A push frame, tagged on `t`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum PushFrame {
    /// Heartbeat
    #[serde(rename = "hb")]
    Heartbeat {
        /// Epoch milliseconds
        ts: u64,
    },
    /// Process telemetry sample
    #[serde(rename = "tm")]
    Telemetry {
        /// Epoch milliseconds
        ts: u64,
        /// CPU usage, percent of one core
        cpu: f64,
        /// Resident memory in bytes
        mem: u64,
    },
    /// User activity summary
    #[serde(rename = "ua")]
    UserActivity {
        /// Epoch milliseconds
        ts: u64,
        /// Summary payload
        meta: serde_json::Value,
    },
}

impl PushFrame {
    /// Create a heartbeat frame
    pub fn heartbeat(ts: u64) -> Self {
        PushFrame::Heartbeat { ts }
    }

    /// Create a telemetry frame
    pub fn telemetry(ts: u64, cpu: f64, mem: u64) -> Self {
        PushFrame::Telemetry { ts, cpu, mem }
    }

    /// Create a user-activity frame
    pub fn user_activity(ts: u64, meta: serde_json::Value) -> Self {
        PushFrame::UserActivity { ts, meta }
    }

    /// Frame timestamp
    pub fn ts(&self) -> u64 {
        match self {
            PushFrame::Heartbeat { ts }
            | PushFrame::Telemetry { ts, .. }
            | PushFrame::UserActivity { ts, .. } => *ts,
        }
    }

    /// The wire discriminant (`hb`, `tm`, `ua`)
    pub fn tag(&self) -> &'static str {
        match self {
            PushFrame::Heartbeat { .. } => "hb",
            PushFrame::Telemetry { .. } => "tm",
            PushFrame::UserActivity { .. } => "ua",
        }
    }

    /// Check if this is a heartbeat
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, PushFrame::Heartbeat { .. })
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A frame as queued for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    /// Unsigned frame
    Plain(PushFrame),
    /// Frame wrapped in a signed envelope
    Signed(SignedFrame),
}

impl OutboundFrame {
    /// The underlying push frame
    pub fn frame(&self) -> &PushFrame {
        match self {
            OutboundFrame::Plain(frame) => frame,
            OutboundFrame::Signed(signed) => &signed.payload,
        }
    }

    /// Whether the frame carries a signature
    pub fn is_signed(&self) -> bool {
        matches!(self, OutboundFrame::Signed(_))
    }

    /// Timestamp used as the event id on the wire
    pub fn ts(&self) -> u64 {
        match self {
            OutboundFrame::Plain(frame) => frame.ts(),
            OutboundFrame::Signed(signed) => signed.ts,
        }
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<PushFrame> for OutboundFrame {
    fn from(frame: PushFrame) -> Self {
        OutboundFrame::Plain(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_heartbeat_wire_shape() {
        let frame = PushFrame::heartbeat(1_700_000_000_000);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({"t": "hb", "ts": 1_700_000_000_000u64}));
    }

    #[test]
    fn test_telemetry_wire_shape() {
        let frame = PushFrame::telemetry(42, 12.5, 1024);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({"t": "tm", "ts": 42, "cpu": 12.5, "mem": 1024}));
    }

    #[test]
    fn test_parse_activity_frame() {
        let frame: PushFrame =
            serde_json::from_str(r#"{"t":"ua","ts":7,"meta":{"click":3}}"#).unwrap();
        assert_eq!(frame, PushFrame::user_activity(7, json!({"click": 3})));
        assert_eq!(frame.tag(), "ua");
        assert_eq!(frame.ts(), 7);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let result: Result<PushFrame, _> = serde_json::from_str(r#"{"t":"zz","ts":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_plain_outbound_serializes_as_frame() {
        let outbound = OutboundFrame::from(PushFrame::heartbeat(9));
        assert_eq!(outbound.to_json().unwrap(), r#"{"t":"hb","ts":9}"#);
        assert!(!outbound.is_signed());
        assert_eq!(outbound.ts(), 9);
    }
}
