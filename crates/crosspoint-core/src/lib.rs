//! Core types and state machines for Crosspoint.
//!
//! This crate provides the protocol primitives: sigs and the message
//! envelope, the control/equipment endpoints and their registries, and the
//! discovery records. Transports live elsewhere; this crate only produces
//! and consumes wire text.

mod advertisement;
mod crosspoint;
mod info;
mod message;
pub mod ports;
mod registry;
mod sig;
mod tracker;

pub use advertisement::{Advertisement, AdvertisementKind};
pub use crosspoint::{
    ConnectResult, ConnectStrategy, ControlCrosspoint, Crosspoint, CrosspointError,
    CrosspointEvent, CrosspointStatus, DisconnectResult, DisconnectStrategy, EquipmentCrosspoint,
};
pub use info::{CrosspointInfo, HostInfo, LOOPBACK};
pub use message::{CrosspointMessage, MessageKind, WireError};
pub use ports::PortError;
pub use registry::{CrosspointRegistry, RegistryError, RegistryEvent};
pub use sig::{SigCache, SigDecodeError, SigKey, SigType, SigValue};
pub use tracker::RemoteCrosspointTracker;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Crosspoint identifier. Zero is reserved.
pub type CrosspointId = u32;

/// "No equipment bound."
pub const NULL_EQUIPMENT: CrosspointId = 0;

// Guarded state is never left half-written; poisoned locks are recovered.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
