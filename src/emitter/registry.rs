//! Emitter registry
//!
//! Emitters are registered during bootstrap, each one validated before it
//! is accepted. Sealing the registry is permanent; the orchestrator only
//! accepts a sealed registry, so the set of emitters (and their cost per
//! tick) is fixed for the life of the process.

use std::sync::Arc;

use super::error::EmitterError;
use super::{PushEmitter, MAX_FRAME_BYTES, MAX_INTERVAL_MS, MIN_INTERVAL_MS};

/// Registry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Accepting registrations
    Open,
    /// Permanently closed
    Sealed,
}

/// Validated set of push emitters
pub struct EmitterRegistry {
    /// Registration order is preserved
    entries: Vec<Arc<dyn PushEmitter>>,
    state: RegistryState,
}

impl EmitterRegistry {
    /// Create an empty, open registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            state: RegistryState::Open,
        }
    }

    /// Validate and add an emitter
    pub fn register(&mut self, emitter: Arc<dyn PushEmitter>) -> Result<(), EmitterError> {
        let result = self.validate(emitter.as_ref());

        match result {
            Ok(size) => {
                tracing::info!(
                    emitter = emitter.id(),
                    min_interval_ms = emitter.min_interval_ms(),
                    frame_bytes = size,
                    "Emitter registered"
                );
                self.entries.push(emitter);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(emitter = emitter.id(), error = %e, "Emitter rejected");
                Err(e)
            }
        }
    }

    /// Run every registration check, returning the serialized frame size
    fn validate(&self, emitter: &dyn PushEmitter) -> Result<usize, EmitterError> {
        if self.state == RegistryState::Sealed {
            return Err(EmitterError::RegistrySealed);
        }

        let id = emitter.id();
        if id.is_empty() {
            return Err(EmitterError::EmptyId);
        }
        if self.entries.iter().any(|e| e.id() == id) {
            return Err(EmitterError::DuplicateId(id.to_string()));
        }

        let interval_ms = emitter.min_interval_ms();
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval_ms) {
            return Err(EmitterError::IntervalOutOfRange {
                id: id.to_string(),
                interval_ms,
                min: MIN_INTERVAL_MS,
                max: MAX_INTERVAL_MS,
            });
        }

        let serialized = emitter.serialize().map_err(|e| EmitterError::SerializeFailed {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        if serialized.len() > MAX_FRAME_BYTES {
            return Err(EmitterError::FrameTooLarge {
                id: id.to_string(),
                size: serialized.len(),
                max: MAX_FRAME_BYTES,
            });
        }

        Ok(serialized.len())
    }

    /// Stop accepting registrations
    pub fn seal(&mut self) {
        if self.state == RegistryState::Open {
            self.state = RegistryState::Sealed;
            tracing::info!(emitters = self.entries.len(), "Emitter registry sealed");
        }
    }

    /// Check if the registry is sealed
    pub fn is_sealed(&self) -> bool {
        self.state == RegistryState::Sealed
    }

    /// Current lifecycle state
    pub fn state(&self) -> RegistryState {
        self.state
    }

    /// All emitters in registration order
    pub fn get_all(&self) -> Vec<Arc<dyn PushEmitter>> {
        self.entries.clone()
    }

    /// Iterate emitters in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PushEmitter>> + '_ {
        self.entries.iter()
    }

    /// Look up an emitter by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn PushEmitter>> {
        self.entries.iter().find(|e| e.id() == id).cloned()
    }

    /// Number of registered emitters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no emitters are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EmitterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EmitterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitterRegistry")
            .field("emitters", &self.entries.iter().map(|e| e.id()).collect::<Vec<_>>())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::HeartbeatEmitter;
    use crate::frame::PushFrame;

    /// Emitter with configurable validation behavior
    struct TestEmitter {
        id: String,
        interval_ms: u64,
        payload_len: usize,
        fail_serialize: bool,
    }

    impl TestEmitter {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                interval_ms: 1_000,
                payload_len: 8,
                fail_serialize: false,
            }
        }
    }

    impl PushEmitter for TestEmitter {
        fn id(&self) -> &str {
            &self.id
        }

        fn min_interval_ms(&self) -> u64 {
            self.interval_ms
        }

        fn should_emit(&self, _now_ms: u64) -> bool {
            true
        }

        fn create_frame(&self, now_ms: u64) -> Result<PushFrame, EmitterError> {
            Ok(PushFrame::user_activity(
                now_ms,
                serde_json::json!({"pad": "x".repeat(self.payload_len)}),
            ))
        }

        fn serialize(&self) -> Result<String, EmitterError> {
            if self.fail_serialize {
                return Err(EmitterError::SerializeFailed {
                    id: self.id.clone(),
                    reason: "boom".into(),
                });
            }
            self.create_frame(u64::MAX)?
                .to_json()
                .map_err(|e| EmitterError::SerializeFailed {
                    id: self.id.clone(),
                    reason: e.to_string(),
                })
        }
    }

    #[test]
    fn test_register_and_snapshot() {
        let mut registry = EmitterRegistry::new();
        registry.register(Arc::new(TestEmitter::new("a"))).unwrap();
        registry
            .register(Arc::new(HeartbeatEmitter::new("hb", 1_000)))
            .unwrap();

        let ids: Vec<String> = registry.get_all().iter().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "hb"]);
        assert!(registry.get("hb").is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_rejects_duplicate_id() {
        let mut registry = EmitterRegistry::new();
        registry.register(Arc::new(TestEmitter::new("dup"))).unwrap();
        assert_eq!(
            registry.register(Arc::new(TestEmitter::new("dup"))),
            Err(EmitterError::DuplicateId("dup".into()))
        );
    }

    #[test]
    fn test_rejects_interval_out_of_range() {
        let mut registry = EmitterRegistry::new();
        for interval_ms in [0, 99, 60_001, u64::MAX] {
            let mut emitter = TestEmitter::new("bad");
            emitter.interval_ms = interval_ms;
            assert!(matches!(
                registry.register(Arc::new(emitter)),
                Err(EmitterError::IntervalOutOfRange { .. })
            ));
        }

        for interval_ms in [100, 60_000] {
            let mut emitter = TestEmitter::new(&format!("ok-{}", interval_ms));
            emitter.interval_ms = interval_ms;
            assert!(registry.register(Arc::new(emitter)).is_ok());
        }
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let mut registry = EmitterRegistry::new();
        let mut emitter = TestEmitter::new("big");
        emitter.payload_len = 2_000;

        assert!(matches!(
            registry.register(Arc::new(emitter)),
            Err(EmitterError::FrameTooLarge { max: 1024, .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejects_failing_serialize() {
        let mut registry = EmitterRegistry::new();
        let mut emitter = TestEmitter::new("broken");
        emitter.fail_serialize = true;

        assert!(matches!(
            registry.register(Arc::new(emitter)),
            Err(EmitterError::SerializeFailed { .. })
        ));
    }

    #[test]
    fn test_rejects_after_seal() {
        let mut registry = EmitterRegistry::new();
        registry.register(Arc::new(TestEmitter::new("a"))).unwrap();
        registry.seal();
        registry.seal();

        assert!(registry.is_sealed());
        assert_eq!(registry.state(), RegistryState::Sealed);
        assert_eq!(
            registry.register(Arc::new(TestEmitter::new("b"))),
            Err(EmitterError::RegistrySealed)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rejects_empty_id() {
        let mut registry = EmitterRegistry::new();
        assert_eq!(
            registry.register(Arc::new(TestEmitter::new(""))),
            Err(EmitterError::EmptyId)
        );
    }
}
