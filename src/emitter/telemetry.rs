//! Telemetry emitter
//!
//! Emits `{t:"tm", ts, cpu, mem}` from a [`TelemetrySampler`]. The default
//! [`ProcessSampler`] reads the current process through `sysinfo`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sysinfo::{Pid, System};

use super::{interval_elapsed, serialize_frame, EmitterError, PushEmitter};
use crate::frame::PushFrame;

/// One telemetry reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySample {
    /// CPU usage since the previous sample, percent of one core
    pub cpu: f64,
    /// Resident memory in bytes
    pub mem: u64,
}

/// Source of telemetry readings
pub trait TelemetrySampler: Send {
    /// Take a reading at `now_ms`
    fn sample(&mut self, now_ms: u64) -> std::io::Result<TelemetrySample>;
}

/// Sampler returning a fixed reading
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSampler(pub TelemetrySample);

impl TelemetrySampler for StaticSampler {
    fn sample(&mut self, _now_ms: u64) -> std::io::Result<TelemetrySample> {
        Ok(self.0)
    }
}

/// Sampler for the current process
pub struct ProcessSampler {
    system: System,
    pid: Option<Pid>,
}

impl ProcessSampler {
    /// Create a sampler; the first reading reports 0% CPU
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSampler")
            .field("pid", &self.pid)
            .finish()
    }
}

impl TelemetrySampler for ProcessSampler {
    fn sample(&mut self, _now_ms: u64) -> std::io::Result<TelemetrySample> {
        let pid = self
            .pid
            .ok_or_else(|| std::io::Error::other("current pid unavailable"))?;

        // CPU usage is measured between consecutive refreshes
        if !self.system.refresh_process(pid) {
            return Err(std::io::Error::other(format!("process {} not found", pid)));
        }
        let process = self
            .system
            .process(pid)
            .ok_or_else(|| std::io::Error::other(format!("process {} not found", pid)))?;

        let cpu = (f64::from(process.cpu_usage()) * 100.0).round() / 100.0;
        Ok(TelemetrySample {
            cpu,
            mem: process.memory(),
        })
    }
}

/// Emits process telemetry once per interval
pub struct TelemetryEmitter {
    id: String,
    interval_ms: u64,
    last_emit_ms: AtomicU64,
    sampler: Mutex<Box<dyn TelemetrySampler>>,
}

impl TelemetryEmitter {
    /// Create an emitter sampling the current process
    pub fn new(id: impl Into<String>, interval_ms: u64) -> Self {
        Self::with_sampler(id, interval_ms, ProcessSampler::new())
    }

    /// Create an emitter with a custom sampler
    pub fn with_sampler(
        id: impl Into<String>,
        interval_ms: u64,
        sampler: impl TelemetrySampler + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            interval_ms,
            last_emit_ms: AtomicU64::new(0),
            sampler: Mutex::new(Box::new(sampler)),
        }
    }
}

impl PushEmitter for TelemetryEmitter {
    fn id(&self) -> &str {
        &self.id
    }

    fn min_interval_ms(&self) -> u64 {
        self.interval_ms
    }

    fn should_emit(&self, now_ms: u64) -> bool {
        interval_elapsed(
            self.last_emit_ms.load(Ordering::Relaxed),
            self.interval_ms,
            now_ms,
        )
    }

    fn create_frame(&self, now_ms: u64) -> Result<PushFrame, EmitterError> {
        self.last_emit_ms.store(now_ms, Ordering::Relaxed);

        let mut sampler = self.sampler.lock().unwrap_or_else(|e| e.into_inner());
        let sample = sampler
            .sample(now_ms)
            .map_err(|e| EmitterError::CreateFailed {
                id: self.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(PushFrame::telemetry(now_ms, sample.cpu, sample.mem))
    }

    fn serialize(&self) -> Result<String, EmitterError> {
        serialize_frame(&self.id, &PushFrame::telemetry(u64::MAX, f64::MIN, u64::MAX))
    }
}

impl std::fmt::Debug for TelemetryEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryEmitter")
            .field("id", &self.id)
            .field("interval_ms", &self.interval_ms)
            .finish()
    }
}
