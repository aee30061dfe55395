use chrono::{DateTime, Utc};
use fleettrack_shared::{domain::LocationFields, LocationUpdate};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::IngestError;

/// A validated position report, stamped on arrival. Never partially filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationEvent {
    pub vehicle_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub event_type: String,
    pub direction: String,
    pub received_at: DateTime<Utc>,
}

impl LocationEvent {
    pub fn received(update: LocationUpdate, received_at: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: update.vehicle_id,
            lat: update.lat,
            lon: update.lon,
            event_type: update.event_type,
            direction: update.direction,
            received_at,
        }
    }

    pub fn to_fields(&self) -> LocationFields {
        LocationFields {
            vehicle_id: self.vehicle_id,
            lat: self.lat,
            lon: self.lon,
            event_type: self.event_type.clone(),
            direction: self.direction.clone(),
            updated_at: self.received_at,
        }
    }
}

/// Parse and validate a raw socket payload.
pub fn parse_update(raw: &str) -> Result<LocationUpdate, IngestError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| IngestError::Malformed(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(IngestError::Malformed("expected a JSON object".into()));
    };

    let vehicle_id = field(&obj, "vehicle_id")?
        .as_i64()
        .ok_or(IngestError::InvalidField {
            field: "vehicle_id",
            reason: "must be an integer",
        })?;
    if vehicle_id <= 0 {
        return Err(IngestError::InvalidField {
            field: "vehicle_id",
            reason: "must be positive",
        });
    }

    let lat = coordinate(&obj, "lat", 90.0)?;
    let lon = coordinate(&obj, "lon", 180.0)?;
    let event_type = label(&obj, "event_type")?;
    let direction = label(&obj, "direction")?;

    Ok(LocationUpdate {
        vehicle_id,
        lat,
        lon,
        event_type,
        direction,
    })
}

fn field<'a>(obj: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, IngestError> {
    match obj.get(name) {
        None | Some(Value::Null) => Err(IngestError::MissingField(name)),
        Some(v) => Ok(v),
    }
}

fn coordinate(obj: &Map<String, Value>, name: &'static str, bound: f64) -> Result<f64, IngestError> {
    let v = field(obj, name)?
        .as_f64()
        .ok_or(IngestError::InvalidField {
            field: name,
            reason: "must be a number",
        })?;
    if !v.is_finite() || v.abs() > bound {
        return Err(IngestError::InvalidField {
            field: name,
            reason: "out of range",
        });
    }
    Ok(v)
}

fn label(obj: &Map<String, Value>, name: &'static str) -> Result<String, IngestError> {
    let s = field(obj, name)?.as_str().ok_or(IngestError::InvalidField {
        field: name,
        reason: "must be a string",
    })?;
    if s.trim().is_empty() {
        return Err(IngestError::MissingField(name));
    }
    Ok(s.to_owned())
}
