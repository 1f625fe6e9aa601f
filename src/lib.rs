//! appsec-agent: runtime core of an in-process application security agent.
//!
//! Modular structure:
//! - [`agent`]: Session lifecycle (login, heartbeat, graceful logout)
//! - [`events`]: Event records and the batching engine delivering them
//! - [`backend`]: Backend session transport (HTTP client and trait)
//! - [`metrics`]: Metrics snapshots sent with each heartbeat
//! - [`config`]: File and environment configuration
//! - [`logging`]: Structured JSON logging

pub mod agent;
pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;

pub use agent::{Agent, AgentState, Session, SessionDefaults};
pub use backend::{BackendClient, SessionTransport};
pub use config::AgentConfig;
pub use error::{AgentError, BackendError, ConfigError};
pub use events::{EventIntake, EventManager, EventRecord, RequestParts, RequestRecord};
pub use logging::StructuredLogger;
pub use metrics::{MetricsSnapshot, MetricsSource, MetricsStore};
