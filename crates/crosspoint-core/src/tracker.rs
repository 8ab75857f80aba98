//! Cache of crosspoints hosted by other programs.

use crate::advertisement::Advertisement;
use crate::info::CrosspointInfo;
use crate::{CrosspointId, lock};
use std::collections::HashMap;
use std::sync::Mutex;

/// Remote crosspoints learned from discovery, keyed by id.
///
/// The most recent record for an id replaces any earlier one.
#[derive(Default)]
pub struct RemoteCrosspointTracker {
    entries: Mutex<HashMap<CrosspointId, CrosspointInfo>>,
}

impl RemoteCrosspointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one remote crosspoint, replacing any record with the same id.
    pub fn add(&self, info: CrosspointInfo) {
        lock(&self.entries).insert(info.id, info);
    }

    /// Record many at once under one lock.
    pub fn add_all(&self, infos: impl IntoIterator<Item = CrosspointInfo>) {
        let mut entries = lock(&self.entries);
        for info in infos {
            entries.insert(info.id, info);
        }
    }

    /// Record both inventories of an advertisement.
    pub fn ingest(&self, advertisement: &Advertisement) {
        self.add_all(
            advertisement
                .controls()
                .iter()
                .chain(advertisement.equipment())
                .cloned(),
        );
    }

    /// Forget a crosspoint, returning its last record.
    pub fn remove(&self, id: CrosspointId) -> Option<CrosspointInfo> {
        lock(&self.entries).remove(&id)
    }

    pub fn contains(&self, id: CrosspointId) -> bool {
        lock(&self.entries).contains_key(&id)
    }

    /// Copy of the record for `id`.
    pub fn try_get(&self, id: CrosspointId) -> Option<CrosspointInfo> {
        lock(&self.entries).get(&id).cloned()
    }

    /// Snapshot of every record, in no particular order.
    pub fn all(&self) -> Vec<CrosspointInfo> {
        lock(&self.entries).values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}
