//! Control and equipment endpoints.
//!
//! A control binds to at most one equipment at a time; an equipment serves
//! any number of controls. Both expose their traffic and state changes as
//! [`CrosspointEvent`]s on a broadcast channel.

mod control;
mod equipment;

pub use control::{
    ConnectResult, ConnectStrategy, ControlCrosspoint, DisconnectResult, DisconnectStrategy,
};
pub use equipment::EquipmentCrosspoint;

use crate::info::{CrosspointInfo, HostInfo};
use crate::message::CrosspointMessage;
use crate::{CrosspointId, NULL_EQUIPMENT};
use std::sync::Arc;

pub(crate) const EVENT_CAPACITY: usize = 64;

/// Common surface of both endpoint kinds.
pub trait Crosspoint: Send + Sync {
    fn id(&self) -> CrosspointId;

    fn name(&self) -> Option<&str>;

    fn status(&self) -> CrosspointStatus;

    /// Discovery record for this crosspoint hosted at `host`.
    fn info(&self, host: &HostInfo) -> CrosspointInfo {
        CrosspointInfo::new(self.id(), self.name().map(str::to_owned), host.clone())
    }
}

/// Connection status of a crosspoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrosspointStatus {
    /// Nothing bound.
    #[default]
    Idle,
    /// A connect strategy is running.
    Connecting,
    /// Bound to a peer.
    Connected,
    /// The last connect attempt did not succeed.
    ConnectFailed,
}

/// Notifications raised by crosspoints.
#[derive(Debug, Clone)]
pub enum CrosspointEvent {
    /// Settled status or binding changed.
    StatusChanged {
        id: CrosspointId,
        status: CrosspointStatus,
        equipment_id: CrosspointId,
    },
    /// An equipment gained or lost a control.
    ControlCountChanged {
        id: CrosspointId,
        count: usize,
    },
    InputDataSent(Arc<CrosspointMessage>),
    OutputDataSent(Arc<CrosspointMessage>),
    /// Inbound message for this crosspoint.
    DataReceived(Arc<CrosspointMessage>),
}

/// Error constructing a crosspoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CrosspointError {
    #[error("crosspoint id must be nonzero")]
    InvalidId,
}

pub(crate) fn validate_id(id: CrosspointId) -> Result<CrosspointId, CrosspointError> {
    if id == NULL_EQUIPMENT {
        Err(CrosspointError::InvalidId)
    } else {
        Ok(id)
    }
}
