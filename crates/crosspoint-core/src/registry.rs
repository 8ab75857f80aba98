//! Per-system registry of local crosspoints.

use crate::crosspoint::Crosspoint;
use crate::info::{CrosspointInfo, HostInfo};
use crate::{CrosspointId, lock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::info;

const EVENT_CAPACITY: usize = 64;

/// Registration changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered(CrosspointId),
    Unregistered(CrosspointId),
}

/// Thread-safe id → crosspoint map scoped to one system id.
pub struct CrosspointRegistry<T> {
    system_id: u32,
    entries: Mutex<HashMap<CrosspointId, Arc<T>>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl<T: Crosspoint> CrosspointRegistry<T> {
    pub fn new(system_id: u32) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            system_id,
            entries: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn system_id(&self) -> u32 {
        self.system_id
    }

    /// Registration changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Add a crosspoint. An id already present is rejected and the
    /// registry is left unchanged.
    pub fn register(&self, crosspoint: Arc<T>) -> Result<(), RegistryError> {
        let id = crosspoint.id();
        {
            let mut entries = lock(&self.entries);
            if entries.contains_key(&id) {
                return Err(RegistryError::Duplicate {
                    system_id: self.system_id,
                    id,
                });
            }
            entries.insert(id, crosspoint);
        }
        info!(system = self.system_id, id, "crosspoint registered");
        let _ = self.events.send(RegistryEvent::Registered(id));
        Ok(())
    }

    /// Remove `crosspoint` if present. Safe to call repeatedly.
    pub fn unregister(&self, crosspoint: &T) -> bool {
        self.unregister_id(crosspoint.id())
    }

    /// Returns whether anything was removed. Only a removal notifies.
    pub fn unregister_id(&self, id: CrosspointId) -> bool {
        if lock(&self.entries).remove(&id).is_none() {
            return false;
        }
        info!(system = self.system_id, id, "crosspoint unregistered");
        let _ = self.events.send(RegistryEvent::Unregistered(id));
        true
    }

    /// Lookup that fails with [`RegistryError::NotFound`].
    pub fn get(&self, id: CrosspointId) -> Result<Arc<T>, RegistryError> {
        self.try_get(id).ok_or(RegistryError::NotFound {
            system_id: self.system_id,
            id,
        })
    }

    pub fn try_get(&self, id: CrosspointId) -> Option<Arc<T>> {
        lock(&self.entries).get(&id).cloned()
    }

    pub fn contains(&self, id: CrosspointId) -> bool {
        lock(&self.entries).contains_key(&id)
    }

    /// Snapshot of registered ids, in no particular order.
    pub fn ids(&self) -> Vec<CrosspointId> {
        lock(&self.entries).keys().copied().collect()
    }

    /// Snapshot of registered crosspoints.
    pub fn all(&self) -> Vec<Arc<T>> {
        lock(&self.entries).values().cloned().collect()
    }

    /// Discovery records for every registered crosspoint.
    pub fn infos(&self, host: &HostInfo) -> Vec<CrosspointInfo> {
        self.all().iter().map(|crosspoint| crosspoint.info(host)).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("crosspoint {id} is already registered in system {system_id}")]
    Duplicate { system_id: u32, id: CrosspointId },
    #[error("crosspoint {id} is not registered in system {system_id}")]
    NotFound { system_id: u32, id: CrosspointId },
}
