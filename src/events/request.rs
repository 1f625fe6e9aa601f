//! Request-level records built by framework adapters for each monitored HTTP request.

use super::{EventRecord, REQUEST_RECORD};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::net::IpAddr;
use uuid::Uuid;

/// Framework-independent view of an incoming request.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub host: Option<String>,
    pub remote_addr: Option<IpAddr>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Header names are lowercased; repeated headers are joined with ", "
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl RequestRecord {
    pub fn new(parts: RequestParts) -> Self {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in parts.headers {
            headers
                .entry(name.to_ascii_lowercase())
                .and_modify(|v| {
                    v.push_str(", ");
                    v.push_str(&value);
                })
                .or_insert(value);
        }
        let user_agent = headers.get("user-agent").cloned();
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            method: parts.method,
            path: parts.path,
            query: parts.query,
            host: parts.host,
            remote_ip: parts.remote_addr,
            user_agent,
            headers,
            status: None,
        }
    }

    /// Record the response status once the handler has run.
    pub fn set_response_status(&mut self, status: u16) {
        self.status = Some(status);
    }
}

impl From<RequestRecord> for EventRecord {
    fn from(record: RequestRecord) -> Self {
        let payload = json!({
            "request": {
                "id": record.id,
                "started_at": record.started_at,
                "method": record.method,
                "path": record.path,
                "query": record.query,
                "host": record.host,
                "remote_ip": record.remote_ip,
                "user_agent": record.user_agent,
                "headers": record.headers,
            },
            "response": {
                "status": record.status,
            },
        });
        EventRecord::new(REQUEST_RECORD, payload)
    }
}
