//! User-activity summary emitter
//!
//! Applications call [`ActivityEmitter::record`] for every user action.
//! Once per interval, if anything was recorded, the emitter produces
//! `{t:"ua", ts, meta:{counts:{kind: n}, total: n}}` and resets.
//!
//! Kinds are sanitized to `[A-Za-z0-9_.:-]` and truncated, and at most
//! [`MAX_KINDS`] distinct kinds are tracked per window (the rest fold into
//! `"other"`), so the frame stays under the registry's size limit.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::json;

use super::{interval_elapsed, serialize_frame, EmitterError, PushEmitter};
use crate::frame::PushFrame;

/// Distinct kinds tracked per window
pub const MAX_KINDS: usize = 12;

/// Longest kind name kept
pub const MAX_KIND_LEN: usize = 32;

const OTHER_KIND: &str = "other";

#[derive(Debug, Default)]
struct ActivityWindow {
    counts: BTreeMap<String, u64>,
    last_emit_ms: u64,
}

impl ActivityWindow {
    fn total(&self) -> u64 {
        self.counts.values().copied().fold(0u64, u64::saturating_add)
    }
}

/// Aggregates user activity into periodic summaries
#[derive(Debug)]
pub struct ActivityEmitter {
    id: String,
    interval_ms: u64,
    window: Mutex<ActivityWindow>,
}

fn sanitize_kind(kind: &str) -> String {
    kind.chars()
        .take(MAX_KIND_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn summary(ts: u64, counts: &BTreeMap<String, u64>, total: u64) -> PushFrame {
    PushFrame::user_activity(ts, json!({ "counts": counts, "total": total }))
}

impl ActivityEmitter {
    /// Create an activity emitter
    pub fn new(id: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            id: id.into(),
            interval_ms,
            window: Mutex::new(ActivityWindow::default()),
        }
    }

    fn window(&self) -> std::sync::MutexGuard<'_, ActivityWindow> {
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record one user action
    pub fn record(&self, kind: &str) {
        let mut kind = sanitize_kind(kind);
        if kind.is_empty() {
            kind = OTHER_KIND.to_string();
        }

        let mut window = self.window();
        // Past the limit, new kinds fold into "other"
        if !window.counts.contains_key(&kind) && window.counts.len() >= MAX_KINDS {
            kind = OTHER_KIND.to_string();
        }
        let count = window.counts.entry(kind).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Actions recorded since the last emission
    pub fn pending(&self) -> u64 {
        self.window().total()
    }
}

impl PushEmitter for ActivityEmitter {
    fn id(&self) -> &str {
        &self.id
    }

    fn min_interval_ms(&self) -> u64 {
        self.interval_ms
    }

    fn should_emit(&self, now_ms: u64) -> bool {
        let window = self.window();
        !window.counts.is_empty() && interval_elapsed(window.last_emit_ms, self.interval_ms, now_ms)
    }

    fn create_frame(&self, now_ms: u64) -> Result<PushFrame, EmitterError> {
        let mut window = self.window();
        let total = window.total();
        let counts = std::mem::take(&mut window.counts);
        window.last_emit_ms = now_ms;

        Ok(summary(now_ms, &counts, total))
    }

    fn serialize(&self) -> Result<String, EmitterError> {
        let mut worst = BTreeMap::new();
        for i in 0..MAX_KINDS {
            let name = format!("{:0width$}", i, width = MAX_KIND_LEN);
            worst.insert(name, u64::MAX);
        }
        worst.insert(OTHER_KIND.to_string(), u64::MAX);

        serialize_frame(&self.id, &summary(u64::MAX, &worst, u64::MAX))
    }
}
