//! Client-side verification key registry
//!
//! Keys are short-lived and live only in process memory. A missing or
//! expired key triggers a fetch from the [`KeySource`], with at least
//! `cooldown_ms` between attempts so a burst of frames signed with an
//! unknown key cannot hammer the key endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::KeyFetchError;
use crate::clock::SharedClock;
use crate::signing::{Algorithm, Secret};

/// Default minimum time between fetch attempts
pub const DEFAULT_FETCH_COOLDOWN_MS: u64 = 1_000;

/// A verification key held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRegistryEntry {
    pub kid: String,
    pub secret: Secret,
    pub algorithm: Algorithm,
    /// Epoch milliseconds
    pub expires_at: u64,
}

impl KeyRegistryEntry {
    /// Whether the key is unusable at `now`
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Where keys come from
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the current key
    async fn fetch(&self) -> Result<KeyRegistryEntry, KeyFetchError>;
}

#[derive(Debug, Default)]
struct KeyState {
    entries: HashMap<String, KeyRegistryEntry>,
    last_fetch_ms: Option<u64>,
}

/// In-memory key cache backed by a [`KeySource`]
pub struct KeyRegistry {
    source: Arc<dyn KeySource>,
    clock: SharedClock,
    cooldown_ms: u64,
    state: Mutex<KeyState>,
}

impl KeyRegistry {
    /// Create an empty registry
    pub fn new(source: Arc<dyn KeySource>, clock: SharedClock) -> Self {
        Self {
            source,
            clock,
            cooldown_ms: DEFAULT_FETCH_COOLDOWN_MS,
            state: Mutex::new(KeyState::default()),
        }
    }

    /// Set the minimum time between fetch attempts
    pub fn with_cooldown(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    /// Look up a key, fetching when it is missing or expired
    ///
    /// `Ok(None)` means a fetch succeeded but did not yield `kid`.
    pub async fn get(&self, kid: &str) -> Result<Option<KeyRegistryEntry>, KeyFetchError> {
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;

        if let Some(entry) = state.entries.get(kid) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.clone()));
            }
        }

        self.refresh_locked(&mut state, now).await?;
        Ok(state.entries.get(kid).cloned())
    }

    /// Fetch the current key now, subject to the cooldown
    pub async fn refresh(&self) -> Result<KeyRegistryEntry, KeyFetchError> {
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state, now).await
    }

    async fn refresh_locked(
        &self,
        state: &mut KeyState,
        now: u64,
    ) -> Result<KeyRegistryEntry, KeyFetchError> {
        if let Some(last) = state.last_fetch_ms {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.cooldown_ms {
                return Err(KeyFetchError::Cooldown {
                    retry_in_ms: self.cooldown_ms - elapsed,
                });
            }
        }
        state.last_fetch_ms = Some(now);

        state.entries.retain(|_, entry| !entry.is_expired(now));

        let entry = match self.source.fetch().await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Key fetch failed");
                return Err(e);
            }
        };

        if entry.is_expired(now) {
            return Err(KeyFetchError::Expired {
                kid: entry.kid,
                expires_at: entry.expires_at,
            });
        }

        tracing::debug!(
            kid = %entry.kid,
            algorithm = %entry.algorithm,
            expires_at = entry.expires_at,
            "Verification key fetched"
        );
        state.entries.insert(entry.kid.clone(), entry.clone());
        Ok(entry)
    }

    /// Install a key directly
    pub async fn insert(&self, entry: KeyRegistryEntry) {
        self.state
            .lock()
            .await
            .entries
            .insert(entry.kid.clone(), entry);
    }

    /// Number of cached keys, expired ones included until the next fetch
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Check for an empty cache
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("cooldown_ms", &self.cooldown_ms)
            .finish_non_exhaustive()
    }
}
