//! Log stream hub implementation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, RwLock};

use super::client::{ClientRecord, ClientStream};
use super::config::HubConfig;
use super::control::{salvage_tag, ControlErrorReason, ControlMessage, ControlResponse};
use super::error::HubError;
use super::filter::ClientFilter;
use super::message::{HubEvent, HubMessage, LogEvent};
use crate::clock::SharedClock;
use crate::flow::TokenBucket;
use crate::stats::ClientStats;

/// Live set of streaming log clients
///
/// Thread-safe via `RwLock`. Broadcast and sweep take the write lock since
/// they update per-client statistics and heartbeat times.
pub struct LogStreamHub {
    clients: RwLock<HashMap<String, ClientRecord>>,
    config: HubConfig,
    clock: SharedClock,
    events: broadcast::Sender<HubEvent>,
}

impl LogStreamHub {
    /// Create a hub
    pub fn new(config: HubConfig, clock: SharedClock) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            clients: RwLock::new(HashMap::new()),
            config,
            clock,
            events,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Subscribe to client lifecycle notifications
    pub fn subscribe_events(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: HubEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Register a client and open its stream
    ///
    /// The stream starts with a `ready` event.
    pub async fn add_client(
        &self,
        id: impl Into<String>,
        filter: Option<ClientFilter>,
    ) -> Result<ClientStream, HubError> {
        let id = id.into();
        let now = self.clock.now_ms();
        let mut clients = self.clients.write().await;

        if clients.contains_key(&id) {
            return Err(HubError::DuplicateClient(id));
        }
        if self.config.max_clients > 0 && clients.len() >= self.config.max_clients {
            // Dead clients awaiting the sweep do not hold a slot
            self.evict_inactive(&mut clients);
        }
        if self.config.max_clients > 0 && clients.len() >= self.config.max_clients {
            tracing::warn!(client = %id, max = self.config.max_clients, "Client rejected: limit reached");
            return Err(HubError::MaxClients(self.config.max_clients));
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        match HubMessage::Ready.to_event(&id, now) {
            Ok(event) => {
                let _ = tx.try_send(event);
            }
            Err(e) => tracing::warn!(client = %id, error = %e, "Failed to encode ready event"),
        }

        clients.insert(
            id.clone(),
            ClientRecord {
                tx,
                connected_at: now,
                last_heartbeat: now,
                active: true,
                filter,
                stats: ClientStats::default(),
                control_bucket: TokenBucket::new(
                    self.config.control_burst,
                    self.config.control_refill_per_sec,
                    Arc::clone(&self.clock),
                ),
            },
        );

        tracing::info!(client = %id, clients = clients.len(), "Client connected");
        drop(clients);

        self.publish(HubEvent::ClientConnected { id: id.clone() });
        Ok(ClientStream::new(id, rx))
    }

    /// Remove a client and close its stream; unknown ids are ignored
    pub async fn remove_client(&self, id: &str) -> bool {
        let removed = self.clients.write().await.remove(id);

        match removed {
            Some(record) => {
                self.log_removed(id, &record, "Client disconnected");
                true
            }
            None => false,
        }
    }

    fn log_removed(&self, id: &str, record: &ClientRecord, reason: &'static str) {
        let duration =
            Duration::from_millis(self.clock.now_ms().saturating_sub(record.connected_at));
        tracing::info!(
            client = %id,
            duration_ms = duration.as_millis() as u64,
            sent = record.stats.sent,
            filtered_out = record.stats.filtered_out,
            "{}",
            reason
        );
        self.publish(HubEvent::ClientDisconnected {
            id: id.to_string(),
            duration,
        });
    }

    fn evict_inactive(&self, clients: &mut HashMap<String, ClientRecord>) {
        let inactive: Vec<String> = clients
            .iter()
            .filter(|(_, c)| !c.active)
            .map(|(id, _)| id.clone())
            .collect();

        for id in inactive {
            if let Some(record) = clients.remove(&id) {
                self.log_removed(&id, &record, "Inactive client evicted");
            }
        }
    }

    /// Fan a message out to every active client
    ///
    /// Log messages are filtered per client. A failed delivery marks the
    /// client inactive for the next sweep. Returns successful deliveries.
    pub async fn broadcast(&self, message: &HubMessage) -> usize {
        let now = self.clock.now_ms();
        let mut clients = self.clients.write().await;
        self.deliver(&mut clients, message, now)
    }

    fn deliver(
        &self,
        clients: &mut HashMap<String, ClientRecord>,
        message: &HubMessage,
        now: u64,
    ) -> usize {
        // Identical for every client
        let shared = match message {
            HubMessage::Ready => None,
            _ => match message.to_event("", now) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode hub message");
                    return 0;
                }
            },
        };

        let mut delivered = 0;
        for (id, client) in clients.iter_mut() {
            if !client.active {
                continue;
            }

            if let (HubMessage::Log(event), Some(filter)) = (message, &client.filter) {
                if !filter.matches(&event.filter_input()) {
                    client.stats.filtered_out += 1;
                    continue;
                }
            }

            let event = match &shared {
                Some(event) => event.clone(),
                None => match message.to_event(id, now) {
                    Ok(event) => event,
                    Err(_) => continue,
                },
            };

            match client.tx.try_send(event) {
                Ok(()) => {
                    delivered += 1;
                    match message {
                        HubMessage::Log(_) => client.stats.sent += 1,
                        HubMessage::Heartbeat => client.last_heartbeat = now,
                        HubMessage::Ready => {}
                    }
                }
                Err(TrySendError::Full(_)) => {
                    client.active = false;
                    tracing::warn!(client = %id, "Client stream full, marking inactive");
                }
                Err(TrySendError::Closed(_)) => {
                    client.active = false;
                    tracing::debug!(client = %id, "Client stream closed, marking inactive");
                }
            }
        }
        delivered
    }

    /// Publish a log event
    pub async fn broadcast_log(&self, event: LogEvent) -> usize {
        self.broadcast(&HubMessage::Log(event)).await
    }

    /// Evict inactive and timed-out clients, then heartbeat the rest
    ///
    /// Returns the ids removed.
    pub async fn sweep(&self) -> Vec<String> {
        let now = self.clock.now_ms();
        let timeout_ms = self.config.client_timeout.as_millis() as u64;
        let mut clients = self.clients.write().await;

        let dead: Vec<String> = clients
            .iter()
            .filter(|(_, c)| !c.active || c.is_expired(now, timeout_ms))
            .map(|(id, _)| id.clone())
            .collect();

        let mut removed = Vec::with_capacity(dead.len());
        for id in dead {
            if let Some(record) = clients.remove(&id) {
                self.log_removed(&id, &record, "Client removed by sweep");
                removed.push(id);
            }
        }

        let alive = self.deliver(&mut clients, &HubMessage::Heartbeat, now);
        tracing::debug!(removed = removed.len(), heartbeats = alive, "Hub sweep");
        removed
    }

    /// Spawn the periodic sweep
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_sweep_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        let interval = hub.config.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                hub.sweep().await;
            }
        })
    }

    /// Refresh a client's heartbeat
    pub async fn touch(&self, id: &str) -> bool {
        let now = self.clock.now_ms();
        match self.clients.write().await.get_mut(id) {
            Some(client) => {
                client.last_heartbeat = now;
                true
            }
            None => false,
        }
    }

    /// Replace a client's filter
    pub async fn set_filter(&self, id: &str, filter: Option<ClientFilter>) -> bool {
        match self.clients.write().await.get_mut(id) {
            Some(client) => {
                client.filter = filter;
                true
            }
            None => false,
        }
    }

    /// Per-client delivery statistics
    pub async fn client_stats(&self, id: &str) -> Option<ClientStats> {
        self.clients.read().await.get(id).map(|c| c.stats)
    }

    /// Number of registered clients (active or awaiting sweep)
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Handle a raw control message from a client
    pub async fn handle_control(&self, client_id: &str, raw: &str) -> ControlResponse {
        self.handle_control_value(client_id, serde_json::from_str(raw).ok())
            .await
    }

    /// Handle a control message already decoded as JSON
    ///
    /// `None` stands for a body that was not valid JSON.
    pub async fn handle_control_value(
        &self,
        client_id: &str,
        message: Option<Value>,
    ) -> ControlResponse {
        let mut clients = self.clients.write().await;

        let Some(client) = clients.get_mut(client_id) else {
            tracing::warn!(client = %client_id, "Control message from unknown client");
            return ControlResponse::error(
                salvage_tag(message.as_ref()),
                ControlErrorReason::AuthFailed,
            );
        };

        if !client.control_bucket.consume() {
            tracing::debug!(client = %client_id, "Control message rate limited");
            return ControlResponse::error(
                salvage_tag(message.as_ref()),
                ControlErrorReason::RateLimited,
            );
        }

        let tag = salvage_tag(message.as_ref());
        let parsed = match message {
            Some(value) => serde_json::from_value::<ControlMessage>(value).map_err(|e| e.to_string()),
            None => Err("body is not JSON".to_string()),
        };
        let message = match parsed {
            Ok(message) => message,
            Err(reason) => {
                tracing::debug!(client = %client_id, reason = %reason, "Unparseable control message");
                return ControlResponse::error(tag, ControlErrorReason::InvalidMessage);
            }
        };

        match message {
            ControlMessage::FilterUpdate { tag, spec } => match ClientFilter::from_spec(spec) {
                Ok(filter) => {
                    tracing::info!(client = %client_id, filter = ?filter, "Client filter updated");
                    client.filter = Some(filter);
                    ControlResponse::Ack { tag }
                }
                Err(reason) => {
                    tracing::debug!(client = %client_id, reason = %reason, "Invalid filter spec");
                    ControlResponse::error(tag, ControlErrorReason::InvalidMessage)
                }
            },
        }
    }
}

impl std::fmt::Debug for LogStreamHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStreamHub")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
