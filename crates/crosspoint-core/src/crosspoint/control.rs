//! Control endpoint and its connect/disconnect negotiation.

use super::{
    Crosspoint, CrosspointError, CrosspointEvent, CrosspointStatus, EVENT_CAPACITY, validate_id,
};
use crate::message::CrosspointMessage;
use crate::sig::SigCache;
use crate::{CrosspointId, NULL_EQUIPMENT, lock, read, write};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// Outcome reported by a [`ConnectStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectResult {
    Connected,
    /// The equipment answered and refused.
    ConnectFailed,
    /// The peer never answered.
    NoResponse,
}

/// Outcome reported by a [`DisconnectStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectResult {
    Disconnected,
    DisconnectFailed,
    /// The peer never answered.
    NoResponse,
}

/// Performs one connect handshake with an equipment.
pub trait ConnectStrategy: Send + Sync {
    fn connect(&self, equipment_id: CrosspointId) -> ConnectResult;
}

impl<F> ConnectStrategy for F
where
    F: Fn(CrosspointId) -> ConnectResult + Send + Sync,
{
    fn connect(&self, equipment_id: CrosspointId) -> ConnectResult {
        self(equipment_id)
    }
}

/// Releases the currently bound equipment.
pub trait DisconnectStrategy: Send + Sync {
    fn disconnect(&self, equipment_id: CrosspointId) -> DisconnectResult;
}

impl<F> DisconnectStrategy for F
where
    F: Fn(CrosspointId) -> DisconnectResult + Send + Sync,
{
    fn disconnect(&self, equipment_id: CrosspointId) -> DisconnectResult {
        self(equipment_id)
    }
}

#[derive(Default)]
struct ControlState {
    equipment_id: CrosspointId,
    status: CrosspointStatus,
    /// A handshake is running outside the lock.
    in_flight: bool,
    sent: SigCache,
}

/// Clears `in_flight` when the handshake ends, including by unwinding out of
/// a strategy.
struct Handshake<'a>(&'a Mutex<ControlState>);

impl Drop for Handshake<'_> {
    fn drop(&mut self) {
        lock(self.0).in_flight = false;
    }
}

/// A consumer endpoint, bound to at most one equipment.
pub struct ControlCrosspoint {
    id: CrosspointId,
    name: Option<String>,
    state: Mutex<ControlState>,
    connect: RwLock<Option<Arc<dyn ConnectStrategy>>>,
    disconnect: RwLock<Option<Arc<dyn DisconnectStrategy>>>,
    events: broadcast::Sender<CrosspointEvent>,
}

impl ControlCrosspoint {
    /// Fails with [`CrosspointError::InvalidId`] for id 0.
    pub fn new(id: CrosspointId, name: Option<String>) -> Result<Self, CrosspointError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            id: validate_id(id)?,
            name,
            state: Mutex::new(ControlState::default()),
            connect: RwLock::new(None),
            disconnect: RwLock::new(None),
            events,
        })
    }

    pub fn with_connect_strategy(self, strategy: impl ConnectStrategy + 'static) -> Self {
        self.set_connect_strategy(strategy);
        self
    }

    pub fn with_disconnect_strategy(self, strategy: impl DisconnectStrategy + 'static) -> Self {
        self.set_disconnect_strategy(strategy);
        self
    }

    pub fn set_connect_strategy(&self, strategy: impl ConnectStrategy + 'static) {
        *write(&self.connect) = Some(Arc::new(strategy));
    }

    pub fn set_disconnect_strategy(&self, strategy: impl DisconnectStrategy + 'static) {
        *write(&self.disconnect) = Some(Arc::new(strategy));
    }

    /// Status changes, sends and receives of this control.
    pub fn subscribe(&self) -> broadcast::Receiver<CrosspointEvent> {
        self.events.subscribe()
    }

    /// Currently bound equipment, or [`NULL_EQUIPMENT`].
    pub fn equipment_id(&self) -> CrosspointId {
        lock(&self.state).equipment_id
    }

    pub fn is_connected(&self) -> bool {
        self.equipment_id() != NULL_EQUIPMENT
    }

    /// Bind to `equipment_id`, or release the current binding when given
    /// [`NULL_EQUIPMENT`].
    ///
    /// Switching from one equipment to another runs the disconnect strategy
    /// for the old one before connecting. Strategies never run while holding
    /// the state lock, and only one handshake runs at a time: a call made
    /// while another is in flight, or naming the current binding, returns
    /// false without invoking anything. Returns whether the final strategy
    /// reported success.
    pub fn initialize(&self, equipment_id: CrosspointId) -> bool {
        let Some(connect) = read(&self.connect).clone() else {
            debug!(control = self.id, "no connect strategy configured");
            return false;
        };

        let (bound, previous) = {
            let mut state = lock(&self.state);
            if state.in_flight || state.equipment_id == equipment_id {
                return false;
            }
            state.in_flight = true;
            let previous = (state.equipment_id, state.status);
            if equipment_id != NULL_EQUIPMENT {
                state.status = CrosspointStatus::Connecting;
            }
            (state.equipment_id, previous)
        };
        let _handshake = Handshake(&self.state);

        if bound != NULL_EQUIPMENT {
            let released = self.run_disconnect(bound);
            debug!(control = self.id, equipment = bound, released, "equipment released");
            if equipment_id == NULL_EQUIPMENT {
                self.settle(NULL_EQUIPMENT, CrosspointStatus::Idle, previous);
                return released;
            }
        }

        match connect.connect(equipment_id) {
            ConnectResult::Connected => {
                debug!(control = self.id, equipment = equipment_id, "connected");
                self.settle(equipment_id, CrosspointStatus::Connected, previous);
                true
            }
            result => {
                debug!(control = self.id, equipment = equipment_id, ?result, "connect failed");
                self.settle(NULL_EQUIPMENT, CrosspointStatus::ConnectFailed, previous);
                false
            }
        }
    }

    /// Release the current binding. Same as `initialize(NULL_EQUIPMENT)`.
    pub fn deinitialize(&self) -> bool {
        self.initialize(NULL_EQUIPMENT)
    }

    /// The equipment dropped this control on its own side. Ignored unless
    /// `equipment_id` is the current binding and no handshake is running.
    pub fn equipment_released(&self, equipment_id: CrosspointId) -> bool {
        let previous = {
            let state = lock(&self.state);
            if equipment_id == NULL_EQUIPMENT
                || state.in_flight
                || state.equipment_id != equipment_id
            {
                return false;
            }
            (state.equipment_id, state.status)
        };
        self.settle(NULL_EQUIPMENT, CrosspointStatus::Idle, previous);
        true
    }

    /// Record an input update and notify subscribers.
    pub fn send_input_data(&self, msg: impl Into<Arc<CrosspointMessage>>) {
        let msg = msg.into();
        self.record(&msg);
        let _ = self.events.send(CrosspointEvent::InputDataSent(msg));
    }

    /// Record an output update and notify subscribers.
    pub fn send_output_data(&self, msg: impl Into<Arc<CrosspointMessage>>) {
        let msg = msg.into();
        self.record(&msg);
        let _ = self.events.send(CrosspointEvent::OutputDataSent(msg));
    }

    /// Hand an inbound message to subscribers.
    pub fn receive_data(&self, msg: impl Into<Arc<CrosspointMessage>>) {
        let _ = self.events.send(CrosspointEvent::DataReceived(msg.into()));
    }

    /// Clear instruction naming every sig this control has sent.
    pub fn clear_message(&self) -> CrosspointMessage {
        let state = lock(&self.state);
        CrosspointMessage::control_clear(self.id, state.equipment_id, state.sent.identities())
    }

    fn run_disconnect(&self, equipment_id: CrosspointId) -> bool {
        match read(&self.disconnect).clone() {
            Some(disconnect) => {
                disconnect.disconnect(equipment_id) == DisconnectResult::Disconnected
            }
            None => false,
        }
    }

    fn record(&self, msg: &CrosspointMessage) {
        lock(&self.state).sent.merge(msg.sigs());
    }

    fn settle(
        &self,
        equipment_id: CrosspointId,
        status: CrosspointStatus,
        previous: (CrosspointId, CrosspointStatus),
    ) {
        {
            let mut state = lock(&self.state);
            state.equipment_id = equipment_id;
            state.status = status;
        }
        if (equipment_id, status) != previous {
            let _ = self.events.send(CrosspointEvent::StatusChanged {
                id: self.id,
                status,
                equipment_id,
            });
        }
    }
}

impl Crosspoint for ControlCrosspoint {
    fn id(&self) -> CrosspointId {
        self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn status(&self) -> CrosspointStatus {
        lock(&self.state).status
    }
}
