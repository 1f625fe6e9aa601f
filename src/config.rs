//! Agent configuration. Server-provided features override the local session defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides (`APPSEC_TOKEN`, `APPSEC_URL`, ...).
pub const ENV_PREFIX: &str = "APPSEC_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Administrative switch: when set the whole runtime is inert
    pub disable: bool,
    /// Backend endpoint and credentials
    pub backend: BackendConfig,
    /// Local fallbacks for the features returned at login
    pub defaults: SessionDefaultsConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend HTTP API
    pub url: String,
    /// Application token sent at login only
    pub token: Option<String>,
    /// Application name sent at login only
    pub app_name: Option<String>,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
    /// Optional HTTPS proxy URL
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaultsConfig {
    /// Heartbeat interval used when the backend sends none (seconds)
    pub heartbeat_secs: u64,
    /// Batch size threshold used when the backend sends none
    pub batch_size: usize,
    /// Batch staleness timeout used when the backend sends none (seconds)
    pub max_staleness_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "https://back.appsec.invalid".to_string(),
            token: None,
            app_name: None,
            timeout_secs: 15,
            proxy: None,
        }
    }
}

impl Default for SessionDefaultsConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 60,
            batch_size: 1000,
            max_staleness_secs: 20,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl SessionDefaultsConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn max_staleness(&self) -> Duration {
        Duration::from_secs(self.max_staleness_secs)
    }
}

impl AgentConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            if let Ok(c) = Self::try_load(path) {
                return c;
            }
        }
        Self::default()
    }

    /// Load from JSON file, reporting read and parse errors.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Apply `APPSEC_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides resolved through `lookup`, keyed by full variable name.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());

        if let Some(v) = var("DISABLE") {
            self.disable = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = var("URL") {
            self.backend.url = v;
        }
        if let Some(v) = var("TOKEN") {
            self.backend.token = Some(v);
        }
        if let Some(v) = var("APP_NAME") {
            self.backend.app_name = Some(v);
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log.level = v;
        }
        self
    }
}
