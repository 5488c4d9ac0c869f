//! Structured message carried by a pipeline pack
//!
//! The pipeline core only looks at `msg_type` (for chain lookup); everything
//! else is for decoders, filters and outputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    pub uuid: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub logger: String,
    pub severity: i32,
    pub payload: String,
    pub env_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    pub hostname: String,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(msg_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            timestamp: Utc::now(),
            msg_type: msg_type.into(),
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// Reset in place, keeping string allocations for the next cycle
    pub fn clear(&mut self) {
        self.uuid = Uuid::nil();
        self.timestamp = DateTime::<Utc>::default();
        self.msg_type.clear();
        self.logger.clear();
        self.severity = 0;
        self.payload.clear();
        self.env_version.clear();
        self.pid = None;
        self.hostname.clear();
        self.fields.clear();
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}
