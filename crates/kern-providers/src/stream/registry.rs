//! Process-wide stream-command registry.
//!
//! Maps (producer domain, consumer domain) pairs to the backend handler that
//! implements stream creation and notification for that pair. Backends
//! register once during provider initialization; the scheduler looks handlers
//! up by pair and never names a concrete backend.

use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use kern_core::DeviceKind;
use tracing::{info, warn};

use super::StreamCommandHandler;

/// Lifecycle state of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Created but not yet accepting registrations.
    Uninitialized,
    /// Accepting registrations and lookups.
    Active,
    /// Shut down; all further use is an error.
    TornDown,
}

/// Registry of stream-command handlers keyed by domain pair.
pub struct StreamCommandRegistry {
    state: RwLock<RegistryState>,
    handlers: DashMap<(DeviceKind, DeviceKind), Arc<dyn StreamCommandHandler>>,
}

impl Default for StreamCommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamCommandRegistry {
    /// Create an uninitialized registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::Uninitialized),
            handlers: DashMap::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RegistryState {
        *self.state.read().unwrap()
    }

    /// Transition to the active state. Fails if already active or torn down.
    pub fn initialize(&self) -> Result<()> {
        let mut state = self.state.write().unwrap();
        match *state {
            RegistryState::Uninitialized => {
                *state = RegistryState::Active;
                info!("Stream-command registry active");
                Ok(())
            }
            other => Err(anyhow!(
                "cannot initialize stream registry from state {:?}",
                other
            )),
        }
    }

    /// Register the handler for a (producer, consumer) domain pair.
    ///
    /// Double registration of a pair is an error: it would silently change
    /// which backend services already-created streams.
    pub fn register_handler(
        &self,
        producer: DeviceKind,
        consumer: DeviceKind,
        handler: Arc<dyn StreamCommandHandler>,
    ) -> Result<()> {
        self.ensure_active()?;
        if self.handlers.contains_key(&(producer, consumer)) {
            return Err(anyhow!(
                "stream handler for {:?} -> {:?} is already registered",
                producer,
                consumer
            ));
        }
        self.handlers.insert((producer, consumer), handler);
        info!(
            "Registered stream handler for {:?} -> {:?}",
            producer, consumer
        );
        Ok(())
    }

    /// Look up the handler for a domain pair.
    pub fn handler(
        &self,
        producer: DeviceKind,
        consumer: DeviceKind,
    ) -> Option<Arc<dyn StreamCommandHandler>> {
        if self.state() != RegistryState::Active {
            warn!("Stream handler lookup on inactive registry");
            return None;
        }
        self.handlers.get(&(producer, consumer)).map(|h| h.clone())
    }

    /// Tear the registry down, dropping all handlers. Streams and
    /// notifications created earlier remain valid until released; new
    /// lookups and registrations fail.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if *state == RegistryState::TornDown {
            return Err(anyhow!("stream registry is already torn down"));
        }
        *state = RegistryState::TornDown;
        self.handlers.clear();
        info!("Stream-command registry torn down");
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state() {
            RegistryState::Active => Ok(()),
            RegistryState::Uninitialized => {
                Err(anyhow!("stream registry has not been initialized"))
            }
            RegistryState::TornDown => Err(anyhow!("stream registry has been torn down")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::cpu::CpuStreamHandler;

    #[test]
    fn test_lifecycle_transitions() -> Result<()> {
        let registry = StreamCommandRegistry::new();
        assert_eq!(registry.state(), RegistryState::Uninitialized);

        // Registration before initialize is rejected.
        let early = registry.register_handler(
            DeviceKind::Cpu,
            DeviceKind::Cpu,
            Arc::new(CpuStreamHandler::new()),
        );
        assert!(early.is_err());

        registry.initialize()?;
        assert_eq!(registry.state(), RegistryState::Active);
        assert!(registry.initialize().is_err());

        registry.register_handler(
            DeviceKind::Cpu,
            DeviceKind::Cpu,
            Arc::new(CpuStreamHandler::new()),
        )?;
        assert!(registry.handler(DeviceKind::Cpu, DeviceKind::Cpu).is_some());

        registry.shutdown()?;
        assert_eq!(registry.state(), RegistryState::TornDown);
        assert!(registry.handler(DeviceKind::Cpu, DeviceKind::Cpu).is_none());
        assert!(registry.shutdown().is_err());
        Ok(())
    }

    #[test]
    fn test_double_registration_rejected() -> Result<()> {
        let registry = StreamCommandRegistry::new();
        registry.initialize()?;
        registry.register_handler(
            DeviceKind::Cpu,
            DeviceKind::Cpu,
            Arc::new(CpuStreamHandler::new()),
        )?;
        let dup = registry.register_handler(
            DeviceKind::Cpu,
            DeviceKind::Cpu,
            Arc::new(CpuStreamHandler::new()),
        );
        assert!(dup.is_err());
        Ok(())
    }
}
