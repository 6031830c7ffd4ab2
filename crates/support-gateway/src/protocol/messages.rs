//! Gateway frame format
//!
//! Client frames are `{"t": "<event>", "d": {...}}`. Server frames add `s`, the
//! connection's sequence number, which increases by one per frame sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One WebSocket text frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Event name
    pub t: String,

    /// Sequence number (server frames only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event payload
    #[serde(default)]
    pub d: Value,
}

impl GatewayMessage {
    /// Server frame
    #[must_use]
    pub fn dispatch(event: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            t: event.into(),
            s: Some(sequence),
            d: data,
        }
    }

    /// Decode the payload as `T`
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        // A missing or null payload is read as an empty object
        match &self.d {
            Value::Null => serde_json::from_value(Value::Object(serde_json::Map::new())),
            d => T::deserialize(d),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
