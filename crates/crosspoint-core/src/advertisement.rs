//! Discovery advertisements.
//!
//! A program periodically announces which controls and equipment it hosts.
//! The JSON object carries `Source`, `Controls` and `Equipment`; whether an
//! advertisement was a broadcast or a direct reply is decided by the channel
//! it arrived on.

use crate::info::{CrosspointInfo, HostInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvertisementKind {
    /// Sent to every program in the system.
    Broadcast,
    /// Sent to one program, usually in answer to its own broadcast.
    Direct,
}

/// Immutable inventory snapshot of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    source: HostInfo,
    controls: BTreeSet<CrosspointInfo>,
    equipment: BTreeSet<CrosspointInfo>,
    kind: AdvertisementKind,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireAdvertisement {
    source: HostInfo,
    #[serde(default)]
    controls: BTreeSet<CrosspointInfo>,
    #[serde(default)]
    equipment: BTreeSet<CrosspointInfo>,
}

impl Advertisement {
    pub fn new(
        source: HostInfo,
        controls: impl IntoIterator<Item = CrosspointInfo>,
        equipment: impl IntoIterator<Item = CrosspointInfo>,
        kind: AdvertisementKind,
    ) -> Self {
        Self {
            source,
            controls: controls.into_iter().collect(),
            equipment: equipment.into_iter().collect(),
            kind,
        }
    }

    pub fn source(&self) -> &HostInfo {
        &self.source
    }

    pub fn controls(&self) -> &BTreeSet<CrosspointInfo> {
        &self.controls
    }

    pub fn equipment(&self) -> &BTreeSet<CrosspointInfo> {
        &self.equipment
    }

    pub fn kind(&self) -> AdvertisementKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty() && self.equipment.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&WireAdvertisement {
            source: self.source.clone(),
            controls: self.controls.clone(),
            equipment: self.equipment.clone(),
        })
    }

    pub fn from_json(text: &str, kind: AdvertisementKind) -> Result<Self, serde_json::Error> {
        let wire: WireAdvertisement = serde_json::from_str(text)?;
        Ok(Self {
            source: wire.source,
            controls: wire.controls,
            equipment: wire.equipment,
            kind,
        })
    }
}
