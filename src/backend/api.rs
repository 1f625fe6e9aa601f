//! Request and response bodies of the backend HTTP API.
//! Only the fields that drive the agent's behavior are modeled.

use crate::events::EventRecord;
use crate::metrics::MetricsSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const AGENT_TYPE: &str = "rust";
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handshake body describing the host process.
#[derive(Debug, Clone, Serialize)]
pub struct AppLoginRequest {
    pub agent_type: String,
    pub agent_version: String,
    pub os_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub pid: u32,
    pub time: DateTime<Utc>,
}

impl AppLoginRequest {
    pub fn from_host() -> Self {
        Self {
            agent_type: AGENT_TYPE.to_string(),
            agent_version: AGENT_VERSION.to_string(),
            os_type: std::env::consts::OS.to_string(),
            hostname: sysinfo::System::host_name(),
            pid: std::process::id(),
            time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppLoginResponse {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub pack_id: String,
    #[serde(default)]
    pub features: Features,
}

/// Server-side tuning. Zero means "use the local default".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Seconds between heartbeats
    pub heartbeat_delay: u64,
    /// Records per batch
    pub batch_size: u64,
    /// Seconds a non-full batch may wait
    pub max_staleness: u64,
    pub use_signals: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppBeatRequest {
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppBeatResponse {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub error: String,
}

/// One tagged entry of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEvent {
    pub event_type: String,
    pub event: EventRecord,
}

impl From<EventRecord> for BatchEvent {
    fn from(event: EventRecord) -> Self {
        Self {
            event_type: event.event_type.clone(),
            event,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchRequest<'a> {
    pub batch: &'a [BatchEvent],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_tolerates_missing_features() {
        let res: AppLoginResponse =
            serde_json::from_str(r#"{"session_id": "s1", "status": true}"#).unwrap();
        assert_eq!(res.session_id, "s1");
        assert!(res.status);
        assert_eq!(res.features.heartbeat_delay, 0);
        assert_eq!(res.features.batch_size, 0);
        assert!(!res.features.use_signals);
    }

    #[test]
    fn batch_event_takes_the_record_type() {
        let record = EventRecord::new("request_record", serde_json::json!({"path": "/"}));
        let event = BatchEvent::from(record.clone());
        assert_eq!(event.event_type, "request_record");
        assert_eq!(event.event, record);
    }
}
