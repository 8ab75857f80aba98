//! Routing facade for one system.
//!
//! Owns the local registries and the remote tracker. Built once in `main`
//! and shared by the broadcaster and listener tasks.

use crate::config::DaemonConfig;
use crosspoint_core::{
    Advertisement, AdvertisementKind, ControlCrosspoint, Crosspoint, CrosspointError, CrosspointId,
    CrosspointMessage, CrosspointRegistry, EquipmentCrosspoint, HostInfo, MessageKind, PortError,
    RegistryError, RemoteCrosspointTracker, WireError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sources not heard from for this long are forgotten, so they count as new
/// when they come back.
pub const SOURCE_TTL: Duration = Duration::from_secs(120);
/// Upper bound on remembered sources. The least recently heard is dropped.
pub const MAX_SOURCES: usize = 256;

pub struct CrosspointService {
    system_id: u32,
    host: HostInfo,
    controls: CrosspointRegistry<ControlCrosspoint>,
    equipment: CrosspointRegistry<EquipmentCrosspoint>,
    tracker: RemoteCrosspointTracker,
    sources: Mutex<SourceLog>,
    source_ttl: Duration,
    max_sources: usize,
}

/// Advertising sources by last time heard. The sequence number orders
/// sources heard within the same clock tick.
#[derive(Default)]
struct SourceLog {
    seen: HashMap<HostInfo, (Instant, u64)>,
    next: u64,
}

impl CrosspointService {
    pub fn new(system_id: u32, host: HostInfo) -> Self {
        Self {
            system_id,
            host,
            controls: CrosspointRegistry::new(system_id),
            equipment: CrosspointRegistry::new(system_id),
            tracker: RemoteCrosspointTracker::new(),
            sources: Mutex::new(SourceLog::default()),
            source_ttl: SOURCE_TTL,
            max_sources: MAX_SOURCES,
        }
    }

    /// Build the service and register every crosspoint the config declares.
    pub fn from_config(config: &DaemonConfig) -> Result<Self, ServiceError> {
        let service = Self::new(config.system_id, config.host()?);
        for entry in &config.controls {
            let control = ControlCrosspoint::new(entry.id, entry.name.clone())?;
            service.controls.register(Arc::new(control))?;
        }
        for entry in &config.equipment {
            let equipment = EquipmentCrosspoint::new(entry.id, entry.name.clone())?;
            service.equipment.register(Arc::new(equipment))?;
        }
        Ok(service)
    }

    pub fn system_id(&self) -> u32 {
        self.system_id
    }

    pub fn host(&self) -> &HostInfo {
        &self.host
    }

    pub fn controls(&self) -> &CrosspointRegistry<ControlCrosspoint> {
        &self.controls
    }

    pub fn equipment(&self) -> &CrosspointRegistry<EquipmentCrosspoint> {
        &self.equipment
    }

    pub fn tracker(&self) -> &RemoteCrosspointTracker {
        &self.tracker
    }

    /// Snapshot of everything this program hosts.
    pub fn advertisement(&self, kind: AdvertisementKind) -> Advertisement {
        Advertisement::new(
            self.host.clone(),
            self.controls.infos(&self.host),
            self.equipment.infos(&self.host),
            kind,
        )
    }

    /// Record a remote inventory.
    ///
    /// Returns true when the source is new, or returns after being silent
    /// for longer than [`SOURCE_TTL`]. Our own advertisements, looped back
    /// by multicast, are ignored.
    pub fn handle_advertisement(
        &self,
        text: &str,
        kind: AdvertisementKind,
    ) -> Result<bool, ServiceError> {
        let advertisement = Advertisement::from_json(text, kind)?;
        if advertisement.source() == &self.host {
            return Ok(false);
        }
        self.tracker.ingest(&advertisement);
        let first_seen = self.note_source(advertisement.source());
        if first_seen {
            info!(
                "Discovered {} with {} controls and {} equipment",
                advertisement.source(),
                advertisement.controls().len(),
                advertisement.equipment().len()
            );
        }
        Ok(first_seen)
    }

    fn note_source(&self, source: &HostInfo) -> bool {
        let now = Instant::now();
        let mut log = self.sources();
        log.seen.retain(|_, (at, _)| now.duration_since(*at) < self.source_ttl);
        log.next += 1;
        let stamp = (now, log.next);
        let first_seen = log.seen.insert(source.clone(), stamp).is_none();
        if log.seen.len() > self.max_sources {
            let oldest = log
                .seen
                .iter()
                .min_by_key(|(_, (_, seq))| *seq)
                .map(|(host, _)| host.clone());
            if let Some(oldest) = oldest {
                log.seen.remove(&oldest);
            }
        }
        first_seen
    }

    fn sources(&self) -> MutexGuard<'_, SourceLog> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Where a remote crosspoint lives, if discovery has seen it.
    pub fn locate(&self, id: CrosspointId) -> Option<HostInfo> {
        self.tracker.try_get(id).map(|info| info.host)
    }

    /// Handle one datagram from the direct channel: either a direct
    /// advertisement or a crosspoint message. Returns the reply to send back.
    pub fn handle_direct(&self, text: &str) -> Result<Option<String>, ServiceError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(WireError::Malformed)?;
        if value.get("Source").is_some() {
            self.handle_advertisement(text, AdvertisementKind::Direct)?;
            return Ok(None);
        }
        let reply = self.handle_message(CrosspointMessage::from_json(text)?)?;
        Ok(reply.map(|msg| msg.to_json()).transpose()?)
    }

    /// Deliver a message to the local crosspoints it addresses.
    pub fn handle_message(
        &self,
        msg: CrosspointMessage,
    ) -> Result<Option<CrosspointMessage>, ServiceError> {
        debug!(kind = %msg.kind(), equipment = msg.equipment_id(), "message received");
        if msg.kind().is_from_control() {
            self.to_equipment(msg)
        } else {
            self.to_controls(msg);
            Ok(None)
        }
    }

    fn to_equipment(
        &self,
        msg: CrosspointMessage,
    ) -> Result<Option<CrosspointMessage>, ServiceError> {
        let equipment = self.equipment.get(msg.equipment_id())?;
        match msg.kind() {
            MessageKind::ControlConnect => {
                let mut controls = msg.control_ids().iter().copied();
                let Some(first) = controls.next() else {
                    warn!("Connect for equipment {} names no control", equipment.id());
                    return Ok(None);
                };
                equipment.initialize(first);
                let mut reply = equipment.connect_message(first);
                for control in controls {
                    equipment.initialize(control);
                    reply.add_control_id(control);
                }
                Ok(Some(reply))
            }
            MessageKind::ControlDisconnect => {
                for &control in msg.control_ids() {
                    equipment.deinitialize(control);
                }
                Ok(None)
            }
            MessageKind::Ping => Ok(Some(msg.to_pong())),
            _ => {
                equipment.receive_data(msg);
                Ok(None)
            }
        }
    }

    fn to_controls(&self, msg: CrosspointMessage) {
        let msg = Arc::new(msg);
        for &id in msg.control_ids() {
            let Some(control) = self.controls.try_get(id) else {
                debug!(control = id, "message for control not hosted here");
                continue;
            };
            if msg.kind() == MessageKind::EquipmentDisconnect {
                control.equipment_released(msg.equipment_id());
            } else {
                control.receive_data(msg.clone());
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("invalid advertisement: {0}")]
    Advertisement(#[from] serde_json::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Crosspoint(#[from] CrosspointError),
    #[error(transparent)]
    Port(#[from] PortError),
}
