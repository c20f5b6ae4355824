//! Notification payload.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A notification about a finished pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: Uuid,
    /// Event name, such as `pipeline.done`.
    pub event: String,
    /// Human-readable summary.
    pub message: String,
    /// Structured event data.
    #[serde(default)]
    pub payload: Value,
    /// When the notification was created.
    pub timestamp: Timestamp,
}

impl Notification {
    /// Creates a notification without payload.
    pub fn new(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            event: event.into(),
            message: message.into(),
            payload: Value::Null,
            timestamp: Timestamp::now(),
        }
    }

    /// Attaches structured event data.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}
