//! Client control protocol
//!
//! ```text
//! → {"type":"filter:update","tag":"t1","spec":{"kind":"keyword","keywords":["db"]}}
//! ← {"type":"filter:ack","tag":"t1"}
//! ← {"type":"filter:error","tag":"t1","reason":"rate_limited"}
//! ```

use serde::{Deserialize, Serialize};

use super::filter::FilterSpec;

/// Client-to-server control message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Replace the client's filter
    #[serde(rename = "filter:update")]
    FilterUpdate { tag: String, spec: FilterSpec },
}

impl ControlMessage {
    /// Correlation tag
    pub fn tag(&self) -> &str {
        match self {
            ControlMessage::FilterUpdate { tag, .. } => tag,
        }
    }
}

/// Why a control message was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlErrorReason {
    InvalidMessage,
    RateLimited,
    AuthFailed,
}

/// Server-to-client control response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ControlResponse {
    #[serde(rename = "filter:ack")]
    Ack { tag: String },
    #[serde(rename = "filter:error")]
    Error {
        tag: String,
        reason: ControlErrorReason,
    },
}

impl ControlResponse {
    pub(crate) fn error(tag: impl Into<String>, reason: ControlErrorReason) -> Self {
        ControlResponse::Error {
            tag: tag.into(),
            reason,
        }
    }

    /// Whether this is an ack
    pub fn is_ack(&self) -> bool {
        matches!(self, ControlResponse::Ack { .. })
    }

    /// Compact JSON
    pub fn to_json(&self) -> String {
        // Plain enum of strings; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Best-effort tag extraction from a message that failed to parse
pub(crate) fn salvage_tag(message: Option<&serde_json::Value>) -> String {
    message
        .and_then(|v| v.get("tag"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .unwrap_or_default()
}
