//! Typed signal values and the deduplicating sig cache.
//!
//! A sig is addressed by `(type, sub_channel, number)`. The sub-channel is the
//! "smart object" number that multiplexes many signal groups over one link.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric signal type. The discriminant is the wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SigType {
    Unset = 0,
    Digital = 1,
    Analog = 2,
    Serial = 3,
}

impl SigType {
    /// Wire code of this type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Type for a wire code, or `None` if the code is unknown.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SigType::Unset),
            1 => Some(SigType::Digital),
            2 => Some(SigType::Analog),
            3 => Some(SigType::Serial),
            _ => None,
        }
    }
}

/// Payload of a sig, tagged by type. `None` means the sig carries no value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Payload {
    Unset,
    Digital(Option<bool>),
    Analog(Option<u16>),
    Serial(Option<String>),
}

/// A single typed signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigValue {
    number: u32,
    sub_channel: u16,
    name: Option<String>,
    payload: Payload,
}

impl SigValue {
    /// On/off signal.
    pub fn digital(sub_channel: u16, number: u32, value: bool) -> Self {
        Self::with_payload(sub_channel, number, Payload::Digital(Some(value)))
    }

    /// Level signal, 0..=65535.
    pub fn analog(sub_channel: u16, number: u32, value: u16) -> Self {
        Self::with_payload(sub_channel, number, Payload::Analog(Some(value)))
    }

    /// Text signal.
    pub fn serial(sub_channel: u16, number: u32, value: impl Into<String>) -> Self {
        Self::with_payload(sub_channel, number, Payload::Serial(Some(value.into())))
    }

    /// A sig that names a signal without carrying a value.
    ///
    /// Used for clear instructions, where only the identity matters.
    pub fn identity(sig_type: SigType, sub_channel: u16, number: u32) -> Self {
        let payload = match sig_type {
            SigType::Unset => Payload::Unset,
            SigType::Digital => Payload::Digital(None),
            SigType::Analog => Payload::Analog(None),
            SigType::Serial => Payload::Serial(None),
        };
        Self::with_payload(sub_channel, number, payload)
    }

    fn with_payload(sub_channel: u16, number: u32, payload: Payload) -> Self {
        Self {
            number,
            sub_channel,
            name: None,
            payload,
        }
    }

    /// Attach a human-readable signal name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn sig_type(&self) -> SigType {
        match self.payload {
            Payload::Unset => SigType::Unset,
            Payload::Digital(_) => SigType::Digital,
            Payload::Analog(_) => SigType::Analog,
            Payload::Serial(_) => SigType::Serial,
        }
    }

    /// Signal number within its sub-channel.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn sub_channel(&self) -> u16 {
        self.sub_channel
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Identity used for caching: type, sub-channel and number.
    pub fn key(&self) -> SigKey {
        SigKey {
            sig_type: self.sig_type(),
            sub_channel: self.sub_channel,
            number: self.number,
        }
    }

    /// False for identity-only sigs.
    pub fn has_value(&self) -> bool {
        match &self.payload {
            Payload::Unset => false,
            Payload::Digital(v) => v.is_some(),
            Payload::Analog(v) => v.is_some(),
            Payload::Serial(v) => v.is_some(),
        }
    }

    /// Value of a digital sig.
    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Payload::Digital(v) => v,
            _ => None,
        }
    }

    /// Value of an analog sig.
    pub fn as_u16(&self) -> Option<u16> {
        match self.payload {
            Payload::Analog(v) => v,
            _ => None,
        }
    }

    /// Value of a serial sig.
    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::Serial(v) => v.as_deref(),
            _ => None,
        }
    }

    /// Same identity, no value.
    pub fn to_identity(&self) -> Self {
        Self {
            name: self.name.clone(),
            ..Self::identity(self.sig_type(), self.sub_channel, self.number)
        }
    }
}

/// Cache key of a sig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SigKey {
    pub sig_type: SigType,
    pub sub_channel: u16,
    pub number: u32,
}

/// Set of sigs with at most one entry per [`SigKey`]. Later adds win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigCache {
    sigs: BTreeMap<SigKey, SigValue>,
}

impl SigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any sig with the same key.
    pub fn add(&mut self, sig: SigValue) {
        self.sigs.insert(sig.key(), sig);
    }

    pub fn add_all(&mut self, sigs: impl IntoIterator<Item = SigValue>) {
        for sig in sigs {
            self.add(sig);
        }
    }

    /// Remove `sig` only if the cached entry is structurally equal to it.
    pub fn remove(&mut self, sig: &SigValue) -> bool {
        let key = sig.key();
        if self.sigs.get(&key) == Some(sig) {
            self.sigs.remove(&key);
            true
        } else {
            false
        }
    }

    /// Copy every sig of `other` in, replacing on key collisions.
    pub fn merge(&mut self, other: &SigCache) {
        self.add_all(other.iter().cloned());
    }

    pub fn get(&self, key: &SigKey) -> Option<&SigValue> {
        self.sigs.get(key)
    }

    pub fn contains_key(&self, key: &SigKey) -> bool {
        self.sigs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SigValue> {
        self.sigs.values()
    }

    /// Sigs that currently hold a value.
    pub fn values_only(&self) -> impl Iterator<Item = &SigValue> {
        self.iter().filter(|sig| sig.has_value())
    }

    /// Value-less copies of every cached sig.
    pub fn identities(&self) -> impl Iterator<Item = SigValue> + '_ {
        self.iter().map(SigValue::to_identity)
    }
}

impl FromIterator<SigValue> for SigCache {
    fn from_iter<I: IntoIterator<Item = SigValue>>(iter: I) -> Self {
        let mut cache = SigCache::new();
        cache.add_all(iter);
        cache
    }
}

impl IntoIterator for SigCache {
    type Item = SigValue;
    type IntoIter = std::collections::btree_map::IntoValues<SigKey, SigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.sigs.into_values()
    }
}

/// Compact wire form of a sig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireSig {
    #[serde(rename = "T")]
    sig_type: u8,
    #[serde(rename = "No")]
    number: u32,
    #[serde(rename = "SO", default, skip_serializing_if = "is_zero")]
    sub_channel: u16,
    #[serde(rename = "V", default, skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
    #[serde(rename = "Na", default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

fn is_zero(v: &u16) -> bool {
    *v == 0
}

impl From<&SigValue> for WireSig {
    fn from(sig: &SigValue) -> Self {
        let value = match &sig.payload {
            Payload::Unset => None,
            Payload::Digital(v) => v.map(serde_json::Value::from),
            Payload::Analog(v) => v.map(serde_json::Value::from),
            Payload::Serial(v) => v.clone().map(serde_json::Value::from),
        };
        Self {
            sig_type: sig.sig_type().code(),
            number: sig.number,
            sub_channel: sig.sub_channel,
            value,
            name: sig.name.clone(),
        }
    }
}

impl TryFrom<WireSig> for SigValue {
    type Error = SigDecodeError;

    fn try_from(wire: WireSig) -> Result<Self, Self::Error> {
        let sig_type =
            SigType::from_code(wire.sig_type).ok_or(SigDecodeError::UnknownType(wire.sig_type))?;
        let invalid = || SigDecodeError::InvalidValue {
            sig_type,
            number: wire.number,
        };
        let payload = match (sig_type, wire.value) {
            (SigType::Unset, None) => Payload::Unset,
            (SigType::Unset, Some(_)) => return Err(invalid()),
            (SigType::Digital, None) => Payload::Digital(None),
            (SigType::Digital, Some(v)) => Payload::Digital(Some(v.as_bool().ok_or_else(invalid)?)),
            (SigType::Analog, None) => Payload::Analog(None),
            (SigType::Analog, Some(v)) => {
                let n = v.as_u64().ok_or_else(invalid)?;
                Payload::Analog(Some(u16::try_from(n).map_err(|_| invalid())?))
            }
            (SigType::Serial, None) => Payload::Serial(None),
            (SigType::Serial, Some(serde_json::Value::String(s))) => Payload::Serial(Some(s)),
            (SigType::Serial, Some(_)) => return Err(invalid()),
        };
        Ok(SigValue {
            number: wire.number,
            sub_channel: wire.sub_channel,
            name: wire.name,
            payload,
        })
    }
}

/// Error turning a wire sig into a [`SigValue`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigDecodeError {
    #[error("unknown sig type code {0}")]
    UnknownType(u8),
    #[error("value does not match sig type {sig_type:?} for sig {number}")]
    InvalidValue { sig_type: SigType, number: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_follows_constructor() {
        assert_eq!(SigValue::digital(0, 1, true).sig_type(), SigType::Digital);
        assert_eq!(SigValue::analog(0, 1, 7).sig_type(), SigType::Analog);
        assert_eq!(SigValue::serial(0, 1, "x").sig_type(), SigType::Serial);
        assert_eq!(
            SigValue::identity(SigType::Analog, 0, 1).sig_type(),
            SigType::Analog
        );
    }

    #[test]
    fn identity_has_no_value() {
        let sig = SigValue::identity(SigType::Serial, 2, 10);
        assert!(!sig.has_value());
        assert_eq!(sig.as_str(), None);
        assert!(SigValue::serial(2, 10, "").has_value());
    }

    #[test]
    fn same_key_last_write_wins() {
        let mut cache = SigCache::new();
        cache.add(SigValue::analog(1, 5, 10));
        cache.add(SigValue::analog(1, 5, 20));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.iter().next().cloned(),
            Some(SigValue::analog(1, 5, 20))
        );
    }

    #[test]
    fn key_includes_type_and_sub_channel() {
        let mut cache = SigCache::new();
        cache.add(SigValue::digital(0, 5, true));
        cache.add(SigValue::analog(0, 5, 1));
        cache.add(SigValue::digital(1, 5, true));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn remove_requires_exact_match() {
        let mut cache: SigCache = [SigValue::serial(0, 1, "on")].into_iter().collect();
        assert!(!cache.remove(&SigValue::serial(0, 1, "off")));
        assert_eq!(cache.len(), 1);
        assert!(cache.remove(&SigValue::serial(0, 1, "on")));
        assert!(cache.is_empty());
    }

    #[test]
    fn values_only_and_identities() {
        let cache: SigCache = [
            SigValue::digital(0, 1, true),
            SigValue::identity(SigType::Analog, 0, 2),
        ]
        .into_iter()
        .collect();
        assert_eq!(cache.values_only().count(), 1);
        assert!(cache.identities().all(|sig| !sig.has_value()));
        assert_eq!(cache.identities().count(), 2);
    }

    #[test]
    fn wire_rejects_mismatched_value() {
        let wire: WireSig = serde_json::from_str(r#"{"T":2,"No":1,"V":"text"}"#).unwrap();
        assert_eq!(
            SigValue::try_from(wire),
            Err(SigDecodeError::InvalidValue {
                sig_type: SigType::Analog,
                number: 1
            })
        );

        let wire: WireSig = serde_json::from_str(r#"{"T":9,"No":1}"#).unwrap();
        assert_eq!(SigValue::try_from(wire), Err(SigDecodeError::UnknownType(9)));
    }

    #[test]
    fn wire_omits_defaults() {
        let json = serde_json::to_string(&WireSig::from(&SigValue::identity(
            SigType::Digital,
            0,
            4,
        )))
        .unwrap();
        assert_eq!(json, r#"{"T":1,"No":4}"#);
    }
}
