//! Security event records and the batching engine delivering them.

mod manager;
mod request;

pub use manager::{EventIntake, EventManager, MAX_BATCH_SIZE};
pub use request::{RequestParts, RequestRecord};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag of request-level records.
pub const REQUEST_RECORD: &str = "request_record";

/// Unified record handed to the event manager by any producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub event_type: String,
    /// Active instrumentation pack, stamped before buffering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rulespack_id: Option<String>,
    pub payload: serde_json::Value,
}

impl EventRecord {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            event_type: event_type.into(),
            rulespack_id: None,
            payload,
        }
    }

    pub fn set_rulespack_id(&mut self, rulespack_id: &str) {
        self.rulespack_id = Some(rulespack_id.to_string());
    }
}
