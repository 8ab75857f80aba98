//! The crosspoint wire envelope.
//!
//! Every message carries a kind, the equipment it concerns, the controls it
//! addresses, opaque JSON payloads and a set of sigs. The wire form uses
//! short keys to keep traffic small on slow links.

use crate::sig::{SigCache, SigDecodeError, SigValue, WireSig};
use crate::{CrosspointId, NULL_EQUIPMENT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Message kind. The discriminant is the wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ControlConnect = 1,
    ControlDisconnect = 2,
    ControlClear = 3,
    EquipmentConnect = 4,
    EquipmentDisconnect = 5,
    Ping = 6,
    Pong = 7,
    ControlData = 8,
    EquipmentData = 9,
}

impl MessageKind {
    /// Wire code of this kind.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Kind for a wire code, or `None` if the code is unknown.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => MessageKind::ControlConnect,
            2 => MessageKind::ControlDisconnect,
            3 => MessageKind::ControlClear,
            4 => MessageKind::EquipmentConnect,
            5 => MessageKind::EquipmentDisconnect,
            6 => MessageKind::Ping,
            7 => MessageKind::Pong,
            8 => MessageKind::ControlData,
            9 => MessageKind::EquipmentData,
            _ => return None,
        })
    }

    /// True for kinds sent by a control towards its equipment.
    pub fn is_from_control(self) -> bool {
        matches!(
            self,
            MessageKind::ControlConnect
                | MessageKind::ControlDisconnect
                | MessageKind::ControlClear
                | MessageKind::ControlData
                | MessageKind::Ping
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A crosspoint protocol message.
///
/// Built through the named constructors so the kind is always valid, then
/// extended with extra control ids, payloads or sigs before sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrosspointMessage {
    kind: MessageKind,
    equipment_id: CrosspointId,
    control_ids: BTreeSet<CrosspointId>,
    payloads: BTreeSet<String>,
    sigs: SigCache,
}

impl CrosspointMessage {
    fn new(kind: MessageKind, equipment_id: CrosspointId) -> Self {
        Self {
            kind,
            equipment_id,
            control_ids: BTreeSet::new(),
            payloads: BTreeSet::new(),
            sigs: SigCache::new(),
        }
    }

    fn addressed(kind: MessageKind, control_id: CrosspointId, equipment_id: CrosspointId) -> Self {
        let mut msg = Self::new(kind, equipment_id);
        msg.add_control_id(control_id);
        msg
    }

    /// Ask an equipment to bind a control.
    pub fn control_connect(control_id: CrosspointId, equipment_id: CrosspointId) -> Self {
        Self::addressed(MessageKind::ControlConnect, control_id, equipment_id)
    }

    /// Ask an equipment to release a control.
    pub fn control_disconnect(control_id: CrosspointId, equipment_id: CrosspointId) -> Self {
        Self::addressed(MessageKind::ControlDisconnect, control_id, equipment_id)
    }

    /// Tell the equipment to reset the given sigs.
    ///
    /// Every sig is carried whether or not it holds a value: only the
    /// identities matter to the receiver.
    pub fn control_clear(
        control_id: CrosspointId,
        equipment_id: CrosspointId,
        sigs: impl IntoIterator<Item = SigValue>,
    ) -> Self {
        let mut msg = Self::addressed(MessageKind::ControlClear, control_id, equipment_id);
        msg.add_sigs(sigs);
        msg
    }

    /// Connect acknowledgement carrying the equipment's current state.
    ///
    /// Sigs without a value are dropped; this is a state snapshot, not an
    /// identity list.
    pub fn equipment_connect(
        control_id: CrosspointId,
        equipment_id: CrosspointId,
        sigs: impl IntoIterator<Item = SigValue>,
    ) -> Self {
        let mut msg = Self::addressed(MessageKind::EquipmentConnect, control_id, equipment_id);
        msg.add_sigs(sigs.into_iter().filter(SigValue::has_value));
        msg
    }

    /// Tell a control its equipment has dropped it.
    pub fn equipment_disconnect(control_id: CrosspointId, equipment_id: CrosspointId) -> Self {
        Self::addressed(MessageKind::EquipmentDisconnect, control_id, equipment_id)
    }

    /// Liveness check towards an equipment. Payloads come back in the pong.
    pub fn ping(
        control_ids: impl IntoIterator<Item = CrosspointId>,
        equipment_id: CrosspointId,
        json: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(MessageKind::Ping, equipment_id);
        msg.add_control_ids(control_ids);
        msg.add_json(json);
        msg
    }

    /// Answer to a [`ping`](Self::ping).
    pub fn pong(
        control_ids: impl IntoIterator<Item = CrosspointId>,
        equipment_id: CrosspointId,
        json: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(MessageKind::Pong, equipment_id);
        msg.add_control_ids(control_ids);
        msg.add_json(json);
        msg
    }

    /// Sig updates from a control to its equipment.
    pub fn control_data(
        control_id: CrosspointId,
        equipment_id: CrosspointId,
        sigs: impl IntoIterator<Item = SigValue>,
    ) -> Self {
        let mut msg = Self::addressed(MessageKind::ControlData, control_id, equipment_id);
        msg.add_sigs(sigs);
        msg
    }

    /// Sig updates from an equipment to the listed controls.
    pub fn equipment_data(
        control_ids: impl IntoIterator<Item = CrosspointId>,
        equipment_id: CrosspointId,
        sigs: impl IntoIterator<Item = SigValue>,
    ) -> Self {
        let mut msg = Self::new(MessageKind::EquipmentData, equipment_id);
        msg.add_control_ids(control_ids);
        msg.add_sigs(sigs);
        msg
    }

    /// Answer to a ping: same addressing and payloads.
    pub fn to_pong(&self) -> Self {
        Self {
            kind: MessageKind::Pong,
            equipment_id: self.equipment_id,
            control_ids: self.control_ids.clone(),
            payloads: self.payloads.clone(),
            sigs: SigCache::new(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn equipment_id(&self) -> CrosspointId {
        self.equipment_id
    }

    /// Controls this message concerns.
    pub fn control_ids(&self) -> &BTreeSet<CrosspointId> {
        &self.control_ids
    }

    /// Opaque JSON payloads carried alongside the sigs.
    pub fn payloads(&self) -> &BTreeSet<String> {
        &self.payloads
    }

    pub fn sigs(&self) -> &SigCache {
        &self.sigs
    }

    pub fn add_control_id(&mut self, id: CrosspointId) {
        self.control_ids.insert(id);
    }

    pub fn add_control_ids(&mut self, ids: impl IntoIterator<Item = CrosspointId>) {
        self.control_ids.extend(ids);
    }

    /// Attach an opaque JSON payload. Duplicates collapse.
    pub fn add_json(&mut self, json: impl Into<String>) {
        self.payloads.insert(json.into());
    }

    /// Returns whether the payload was present.
    pub fn remove_json(&mut self, json: &str) -> bool {
        self.payloads.remove(json)
    }

    /// Add or replace a sig with the same key.
    pub fn add_sig(&mut self, sig: SigValue) {
        self.sigs.add(sig);
    }

    pub fn add_sigs(&mut self, sigs: impl IntoIterator<Item = SigValue>) {
        self.sigs.add_all(sigs);
    }

    /// Encode to the compact wire form.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(&WireMessage::from(self)).map_err(WireError::Malformed)
    }

    /// Decode wire text. Unknown kind codes and bad sigs are errors.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        let wire: WireMessage = serde_json::from_str(text).map_err(WireError::Malformed)?;
        Self::try_from(wire)
    }

    /// Reject a well-formed message of the wrong kind.
    pub fn expect_kind(self, expected: MessageKind) -> Result<Self, WireError> {
        if self.kind == expected {
            Ok(self)
        } else {
            Err(WireError::UnexpectedKind {
                expected,
                actual: self.kind,
            })
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    #[serde(rename = "T")]
    kind: u8,
    #[serde(rename = "EId", default, skip_serializing_if = "is_null_equipment")]
    equipment_id: CrosspointId,
    #[serde(rename = "CIds", default, skip_serializing_if = "Vec::is_empty")]
    control_ids: Vec<CrosspointId>,
    #[serde(rename = "J", default, skip_serializing_if = "Vec::is_empty")]
    payloads: Vec<String>,
    #[serde(rename = "S", default, skip_serializing_if = "Vec::is_empty")]
    sigs: Vec<WireSig>,
}

fn is_null_equipment(id: &CrosspointId) -> bool {
    *id == NULL_EQUIPMENT
}

impl From<&CrosspointMessage> for WireMessage {
    fn from(msg: &CrosspointMessage) -> Self {
        Self {
            kind: msg.kind.code(),
            equipment_id: msg.equipment_id,
            control_ids: msg.control_ids.iter().copied().collect(),
            payloads: msg.payloads.iter().cloned().collect(),
            sigs: msg.sigs.iter().map(WireSig::from).collect(),
        }
    }
}

impl TryFrom<WireMessage> for CrosspointMessage {
    type Error = WireError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let kind =
            MessageKind::from_code(wire.kind).ok_or(WireError::UnknownMessageKind(wire.kind))?;
        let mut msg = CrosspointMessage::new(kind, wire.equipment_id);
        msg.add_control_ids(wire.control_ids);
        msg.payloads.extend(wire.payloads);
        for sig in wire.sigs {
            msg.add_sig(SigValue::try_from(sig)?);
        }
        Ok(msg)
    }
}

/// Error decoding or encoding wire text.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed wire text: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("unknown message kind code {0}")]
    UnknownMessageKind(u8),
    #[error(transparent)]
    Sig(#[from] SigDecodeError),
    #[error("expected {expected} message, got {actual}")]
    UnexpectedKind {
        expected: MessageKind,
        actual: MessageKind,
    },
}
