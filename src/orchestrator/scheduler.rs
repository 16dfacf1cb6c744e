//! Push orchestrator implementation
//!
//! Each tick runs four phases in order, holding the state lock throughout
//! so ticks never overlap:
//!
//! 1. emit: due emitters produce frames, which are optionally signed and
//!    enqueued into every connection's ring buffer
//! 2. flush: each due connection drains its buffer through its adapter,
//!    limited by its token bucket and `max_frames_per_tick`
//! 3. backoff: slow sends grow the connection's backoff, clean flushes
//!    reset it
//! 4. sweep: failed or disconnected connections are removed

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::adapter::{PushAdapter, SendOutcome};
use super::config::OrchestratorConfig;
use super::connection::{ConnectionSnapshot, ConnectionState};
use super::error::ConfigError;
use crate::clock::SharedClock;
use crate::emitter::EmitterRegistry;
use crate::frame::OutboundFrame;
use crate::signing::FrameSigner;
use crate::stats::{MetricsSnapshot, PushMetrics};

/// What a single tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Frames produced by emitters
    pub emitted: usize,
    /// Frames handed to adapters
    pub sent: u64,
    /// Connections removed by the sweep
    pub removed: Vec<String>,
}

/// Mutable orchestrator state, guarded by one lock
#[derive(Default)]
struct TickState {
    connections: HashMap<String, ConnectionState>,
    /// Earliest next emission per emitter id
    next_emit_ms: HashMap<String, u64>,
}

struct RunHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Tick-driven push scheduler
pub struct PushOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<EmitterRegistry>,
    signer: Option<FrameSigner>,
    clock: SharedClock,
    state: Mutex<TickState>,
    metrics: PushMetrics,
    run_handle: std::sync::Mutex<Option<RunHandle>>,
}

impl PushOrchestrator {
    /// Create an orchestrator over a sealed registry
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<EmitterRegistry>,
        clock: SharedClock,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if !registry.is_sealed() {
            return Err(ConfigError::RegistryNotSealed);
        }

        Ok(Self {
            config,
            registry,
            signer: None,
            clock,
            state: Mutex::new(TickState::default()),
            metrics: PushMetrics::new(),
            run_handle: std::sync::Mutex::new(None),
        })
    }

    /// Sign every emitted frame
    pub fn with_signer(mut self, signer: FrameSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register a connection; duplicate ids are ignored
    pub async fn add_connection(&self, adapter: Arc<dyn PushAdapter>) -> bool {
        let id = adapter.connection_id().to_string();
        let mut state = self.state.lock().await;

        if state.connections.contains_key(&id) {
            tracing::warn!(connection = %id, "Connection already registered, ignoring");
            return false;
        }

        state.connections.insert(
            id.clone(),
            ConnectionState::new(adapter, &self.config, Arc::clone(&self.clock)),
        );
        self.metrics.set_connection_count(state.connections.len());

        tracing::info!(
            connection = %id,
            connections = state.connections.len(),
            "Connection added"
        );
        true
    }

    /// Remove a connection; unknown ids are ignored
    pub async fn remove_connection(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;

        match state.connections.remove(id) {
            Some(conn) => {
                self.metrics.set_connection_count(state.connections.len());
                tracing::info!(
                    connection = %id,
                    pending = conn.buffer.len(),
                    "Connection removed"
                );
                true
            }
            None => {
                tracing::debug!(connection = %id, "Remove for unknown connection, ignoring");
                false
            }
        }
    }

    /// Ids of live connections
    pub async fn connection_ids(&self) -> Vec<String> {
        self.state.lock().await.connections.keys().cloned().collect()
    }

    /// Diagnostic view of one connection
    pub async fn connection_snapshot(&self, id: &str) -> Option<ConnectionSnapshot> {
        let mut state = self.state.lock().await;
        state.connections.get_mut(id).map(|conn| conn.snapshot(id))
    }

    /// Cumulative metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run one tick
    pub async fn tick(&self) -> TickReport {
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;
        let mut report = TickReport::default();

        self.emit_phase(&mut state, now, &mut report);
        self.flush_phase(&mut state.connections, now, true, &mut report)
            .await;
        self.sweep(&mut state.connections, &mut report);

        self.metrics.set_connection_count(state.connections.len());
        report
    }

    fn emit_phase(&self, state: &mut TickState, now: u64, report: &mut TickReport) {
        let TickState {
            connections,
            next_emit_ms,
        } = state;

        for emitter in self.registry.iter() {
            let id = emitter.id();
            let due_at = next_emit_ms.get(id).copied().unwrap_or(0);
            if now < due_at || !emitter.should_emit(now) {
                continue;
            }
            next_emit_ms.insert(id.to_string(), now + emitter.min_interval_ms());

            let frame = match emitter.create_frame(now) {
                Ok(frame) => frame,
                Err(e) => {
                    self.metrics.inc_emission_errors();
                    tracing::warn!(emitter = id, error = %e, "Emitter failed");
                    continue;
                }
            };

            let outbound = match &self.signer {
                Some(signer) => match signer.sign(frame) {
                    Ok(signed) => OutboundFrame::Signed(signed),
                    Err(e) => {
                        self.metrics.inc_emission_errors();
                        tracing::warn!(emitter = id, error = %e, "Frame signing failed");
                        continue;
                    }
                },
                None => OutboundFrame::Plain(frame),
            };

            report.emitted += 1;

            let mut dropped = 0u64;
            for conn in connections.values_mut() {
                if conn.enqueue(outbound.clone()) {
                    dropped += 1;
                }
            }
            if dropped > 0 {
                self.metrics.add_frames_dropped(dropped);
                tracing::debug!(emitter = id, dropped, "Buffers full, dropped oldest frames");
            }
        }
    }

    async fn flush_phase(
        &self,
        connections: &mut HashMap<String, ConnectionState>,
        now: u64,
        respect_schedule: bool,
        report: &mut TickReport,
    ) {
        for (id, conn) in connections.iter_mut() {
            if conn.failed || conn.buffer.is_empty() {
                continue;
            }
            if respect_schedule && !conn.is_due(now) {
                continue;
            }

            let mut sent = 0usize;
            let mut saw_slow = false;

            while sent < self.config.max_frames_per_tick && !conn.buffer.is_empty() {
                if !conn.bucket.consume() {
                    self.metrics.inc_rate_limit_events();
                    tracing::trace!(connection = %id, "Rate limited");
                    break;
                }

                let Some(frame) = conn.buffer.dequeue() else {
                    break;
                };

                match conn.adapter.send(&frame).await {
                    SendOutcome::Success => sent += 1,
                    SendOutcome::Slow => {
                        sent += 1;
                        saw_slow = true;
                    }
                    SendOutcome::Error => {
                        conn.failed = true;
                        tracing::warn!(connection = %id, "Send failed, scheduling removal");
                        break;
                    }
                }
            }

            self.metrics.add_frames_sent(sent as u64);
            report.sent += sent as u64;
            conn.last_flush_ms = now;

            if !conn.failed && conn.update_backoff(saw_slow, now, &self.config) {
                self.metrics.inc_backoff_events();
                tracing::debug!(
                    connection = %id,
                    backoff_ms = conn.backoff_ms,
                    "Slow connection, backing off"
                );
            }
        }
    }

    fn sweep(&self, connections: &mut HashMap<String, ConnectionState>, report: &mut TickReport) {
        let dead: Vec<String> = connections
            .iter()
            .filter(|(_, conn)| conn.should_remove())
            .map(|(id, _)| id.clone())
            .collect();

        for id in dead {
            if let Some(conn) = connections.remove(&id) {
                tracing::info!(
                    connection = %id,
                    failed = conn.failed,
                    pending = conn.buffer.len(),
                    "Connection removed by sweep"
                );
            }
            report.removed.push(id);
        }
    }

    /// Flush every connection once, ignoring backoff schedules
    async fn final_flush(&self) -> u64 {
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;
        let mut report = TickReport::default();

        self.flush_phase(&mut state.connections, now, false, &mut report)
            .await;
        self.sweep(&mut state.connections, &mut report);
        self.metrics.set_connection_count(state.connections.len());
        report.sent
    }

    /// Spawn the tick loop; returns false if already running
    pub fn start(self: &Arc<Self>) -> bool {
        let mut handle = self.run_handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.is_some() {
            tracing::debug!("Orchestrator already running");
            return false;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let orchestrator = Arc::clone(self);
        let period = self.config.tick_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        orchestrator.tick().await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        *handle = Some(RunHandle { shutdown, task });
        tracing::info!(
            fps = self.config.fps,
            emitters = self.registry.len(),
            signed = self.signer.is_some(),
            "Orchestrator started"
        );
        true
    }

    /// Check if the tick loop is running
    pub fn is_running(&self) -> bool {
        self.run_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Stop the tick loop and attempt one final flush
    ///
    /// Idempotent. The in-flight tick completes first; the final flush is
    /// bounded by `shutdown_timeout` and a timeout is only logged.
    pub async fn stop(&self) {
        let handle = self
            .run_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(handle) = handle else {
            tracing::debug!("Orchestrator not running");
            return;
        };

        let _ = handle.shutdown.send(true);
        if let Err(e) = handle.task.await {
            tracing::warn!(error = %e, "Tick loop ended abnormally");
        }

        match tokio::time::timeout(self.config.shutdown_timeout, self.final_flush()).await {
            Ok(sent) => tracing::info!(sent, "Orchestrator stopped"),
            Err(_) => tracing::warn!(
                timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                "Final flush timed out"
            ),
        }
    }
}

impl std::fmt::Debug for PushOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushOrchestrator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("signed", &self.signer.is_some())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
