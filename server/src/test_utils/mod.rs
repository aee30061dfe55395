//! Components shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use fleettrack_shared::domain::{LocationFields, LocationRecord};
use parking_lot::Mutex;

use crate::{errors::StoreError, location::LocationEvent, store::LocationStore};

pub fn event(vehicle_id: i64, lat: f64) -> LocationEvent {
    LocationEvent {
        vehicle_id,
        lat,
        lon: -74.08,
        event_type: "moving".into(),
        direction: "north".into(),
        received_at: Utc::now(),
    }
}

/// Store backed by a map. Vehicles listed in `failing` error on every call.
#[derive(Default)]
pub struct InMemoryLocationStore {
    records: Mutex<HashMap<i64, LocationRecord>>,
    failing: Mutex<HashSet<i64>>,
    next_id: AtomicU64,
    upserts: Mutex<HashMap<i64, usize>>,
}

impl InMemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_vehicle(&self, vehicle_id: i64) {
        self.failing.lock().insert(vehicle_id);
    }

    pub fn record(&self, vehicle_id: i64) -> Option<LocationRecord> {
        self.records.lock().get(&vehicle_id).cloned()
    }

    /// Number of create/update calls made for `vehicle_id`.
    pub fn upserts(&self, vehicle_id: i64) -> usize {
        self.upserts.lock().get(&vehicle_id).copied().unwrap_or(0)
    }

    fn check(&self, vehicle_id: i64) -> Result<(), StoreError> {
        if self.failing.lock().contains(&vehicle_id) {
            return Err(StoreError::Unavailable(format!("vehicle {vehicle_id} rejected")));
        }
        Ok(())
    }

    fn count(&self, vehicle_id: i64) {
        *self.upserts.lock().entry(vehicle_id).or_default() += 1;
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn find_by_vehicle(&self, vehicle_id: i64) -> Result<Option<LocationRecord>, StoreError> {
        self.check(vehicle_id)?;
        Ok(self.record(vehicle_id))
    }

    async fn create(&self, fields: LocationFields) -> Result<LocationRecord, StoreError> {
        self.check(fields.vehicle_id)?;
        self.count(fields.vehicle_id);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = fields.into_record(id);
        self.records.lock().insert(record.vehicle_id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        location_id: u64,
        fields: LocationFields,
    ) -> Result<LocationRecord, StoreError> {
        self.check(fields.vehicle_id)?;
        self.count(fields.vehicle_id);
        let mut records = self.records.lock();
        match records.get(&fields.vehicle_id) {
            Some(existing) if existing.location_id == location_id => {}
            _ => return Err(StoreError::NotFound(location_id)),
        }
        let record = fields.into_record(location_id);
        records.insert(record.vehicle_id, record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<LocationRecord>, StoreError> {
        Ok(self.records.lock().values().cloned().collect())
    }
}
