use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable, latest-known position of one vehicle.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationRecord {
    pub location_id: u64,
    pub vehicle_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub event_type: String,
    pub direction: String,
    pub updated_at: DateTime<Utc>,
}

/// The fields of a record a flush writes; the store assigns `location_id`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationFields {
    pub vehicle_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub event_type: String,
    pub direction: String,
    pub updated_at: DateTime<Utc>,
}

impl LocationFields {
    pub fn into_record(self, location_id: u64) -> LocationRecord {
        LocationRecord {
            location_id,
            vehicle_id: self.vehicle_id,
            lat: self.lat,
            lon: self.lon,
            event_type: self.event_type,
            direction: self.direction,
            updated_at: self.updated_at,
        }
    }
}
