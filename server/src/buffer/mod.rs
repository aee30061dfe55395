//! Latest-wins staging area between ingestion and the flush cycle.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::location::LocationEvent;

/// Per-vehicle map of the newest event not yet flushed.
///
/// One lock covers both `set` and `drain`, so a `set` either lands in the
/// generation a drain takes or in the fresh one that replaces it.
#[derive(Debug, Default)]
pub struct CoalescingBuffer {
    pending: Mutex<HashMap<i64, LocationEvent>>,
}

/// Snapshot taken by one drain. Owned, so later `set` calls cannot touch it.
#[derive(Debug, Default)]
pub struct FlushBatch {
    entries: HashMap<i64, LocationEvent>,
}

impl CoalescingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `event`, replacing whatever was pending for the vehicle.
    /// Returns the superseded event, if any.
    pub fn set(&self, vehicle_id: i64, event: LocationEvent) -> Option<LocationEvent> {
        self.pending.lock().insert(vehicle_id, event)
    }

    /// Take every pending entry and leave an empty generation behind.
    pub fn drain(&self) -> FlushBatch {
        let entries = std::mem::take(&mut *self.pending.lock());
        FlushBatch { entries }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, vehicle_id: i64) -> Option<LocationEvent> {
        self.pending.lock().get(&vehicle_id).cloned()
    }
}

impl FlushBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, vehicle_id: i64) -> Option<&LocationEvent> {
        self.entries.get(&vehicle_id)
    }
}

impl IntoIterator for FlushBatch {
    type Item = (i64, LocationEvent);
    type IntoIter = std::collections::hash_map::IntoIter<i64, LocationEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
