//! Heartbeat emitter

use std::sync::atomic::{AtomicU64, Ordering};

use super::{interval_elapsed, serialize_frame, EmitterError, PushEmitter};
use crate::frame::PushFrame;

/// Emits `{t:"hb", ts}` once per interval
#[derive(Debug)]
pub struct HeartbeatEmitter {
    id: String,
    interval_ms: u64,
    last_emit_ms: AtomicU64,
}

impl HeartbeatEmitter {
    /// Create a heartbeat emitter
    pub fn new(id: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            id: id.into(),
            interval_ms,
            last_emit_ms: AtomicU64::new(0),
        }
    }

    /// Time of the last emission (0 if never)
    pub fn last_emit_ms(&self) -> u64 {
        self.last_emit_ms.load(Ordering::Relaxed)
    }
}

impl PushEmitter for HeartbeatEmitter {
    fn id(&self) -> &str {
        &self.id
    }

    fn min_interval_ms(&self) -> u64 {
        self.interval_ms
    }

    fn should_emit(&self, now_ms: u64) -> bool {
        interval_elapsed(self.last_emit_ms(), self.interval_ms, now_ms)
    }

    fn create_frame(&self, now_ms: u64) -> Result<PushFrame, EmitterError> {
        self.last_emit_ms.store(now_ms, Ordering::Relaxed);
        Ok(PushFrame::heartbeat(now_ms))
    }

    fn serialize(&self) -> Result<String, EmitterError> {
        serialize_frame(&self.id, &PushFrame::heartbeat(u64::MAX))
    }
}
