pub mod domain;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Position report as sent by a vehicle over the live socket.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub vehicle_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub event_type: String,
    pub direction: String,
}

/// Every frame the server writes to an observer, acknowledgements and
/// relayed locations alike.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Frame {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Frame {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::ok(message)
        }
    }

    pub fn failure(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error,
        }
    }
}
