//! Equipment endpoint serving any number of controls.

use super::{
    Crosspoint, CrosspointError, CrosspointEvent, CrosspointStatus, EVENT_CAPACITY, validate_id,
};
use crate::message::CrosspointMessage;
use crate::sig::SigCache;
use crate::{CrosspointId, lock};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Default)]
struct EquipmentState {
    control_ids: BTreeSet<CrosspointId>,
    sent: SigCache,
}

/// A provider endpoint. Any number of controls may bind to it.
pub struct EquipmentCrosspoint {
    id: CrosspointId,
    name: Option<String>,
    state: Mutex<EquipmentState>,
    events: broadcast::Sender<CrosspointEvent>,
}

impl EquipmentCrosspoint {
    /// Fails with [`CrosspointError::InvalidId`] for id 0.
    pub fn new(id: CrosspointId, name: Option<String>) -> Result<Self, CrosspointError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            id: validate_id(id)?,
            name,
            state: Mutex::new(EquipmentState::default()),
            events,
        })
    }

    /// Control count changes, sends and receives of this equipment.
    pub fn subscribe(&self) -> broadcast::Receiver<CrosspointEvent> {
        self.events.subscribe()
    }

    /// Bind a control. Returns false if it was already bound.
    pub fn initialize(&self, control_id: CrosspointId) -> bool {
        let count = {
            let mut state = lock(&self.state);
            if !state.control_ids.insert(control_id) {
                return false;
            }
            state.control_ids.len()
        };
        debug!(equipment = self.id, control = control_id, count, "control bound");
        self.count_changed(count);
        true
    }

    /// Unbind a control. Unknown ids are ignored.
    pub fn deinitialize(&self, control_id: CrosspointId) -> bool {
        let count = {
            let mut state = lock(&self.state);
            if !state.control_ids.remove(&control_id) {
                return false;
            }
            state.control_ids.len()
        };
        debug!(equipment = self.id, control = control_id, count, "control unbound");
        self.count_changed(count);
        true
    }

    /// Snapshot of bound controls.
    pub fn control_ids(&self) -> BTreeSet<CrosspointId> {
        lock(&self.state).control_ids.clone()
    }

    pub fn control_count(&self) -> usize {
        lock(&self.state).control_ids.len()
    }

    pub fn is_bound(&self, control_id: CrosspointId) -> bool {
        lock(&self.state).control_ids.contains(&control_id)
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

    /// Connect acknowledgement carrying the state this equipment has sent.
    pub fn connect_message(&self, control_id: CrosspointId) -> CrosspointMessage {
        let state = lock(&self.state);
        CrosspointMessage::equipment_connect(control_id, self.id, state.sent.iter().cloned())
    }

    fn record(&self, msg: &CrosspointMessage) {
        lock(&self.state).sent.merge(msg.sigs());
    }

    fn count_changed(&self, count: usize) {
        let _ = self
            .events
            .send(CrosspointEvent::ControlCountChanged { id: self.id, count });
    }
}

impl Crosspoint for EquipmentCrosspoint {
    fn id(&self) -> CrosspointId {
        self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Connected while at least one control is bound.
    fn status(&self) -> CrosspointStatus {
        if self.control_count() > 0 {
            CrosspointStatus::Connected
        } else {
            CrosspointStatus::Idle
        }
    }
}
