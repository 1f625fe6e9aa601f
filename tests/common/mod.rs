//! In-memory backend used to drive the agent lifecycle in tests.

#![allow(dead_code)]

use appsec_agent::backend::api::{
    AppBeatRequest, AppBeatResponse, AppLoginRequest, AppLoginResponse, BatchEvent, Features,
};
use appsec_agent::config::AgentConfig;
use appsec_agent::metrics::MetricsSnapshot;
use appsec_agent::{Agent, AgentState, BackendError, SessionTransport};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const TOKEN: &str = "test-token";
pub const APP_NAME: &str = "test-app";
pub const SESSION_ID: &str = "session-1";
pub const PACK_ID: &str = "pack-1";

pub fn config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.backend.token = Some(TOKEN.to_string());
    config.backend.app_name = Some(APP_NAME.to_string());
    config
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LoginBehavior {
    Accept,
    Reject,
    Hang,
}

pub struct MockTransport {
    login: LoginBehavior,
    features: Features,
    batch_delay: Duration,
    pub fail_heartbeats: AtomicBool,
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub heartbeats: Mutex<Vec<MetricsSnapshot>>,
    pub batches: Mutex<Vec<Vec<BatchEvent>>>,
    /// Backend calls in completion order.
    pub calls: Mutex<Vec<&'static str>>,
}

impl MockTransport {
    pub fn new(features: Features) -> Self {
        Self::with_login(LoginBehavior::Accept, features)
    }

    pub fn with_login(login: LoginBehavior, features: Features) -> Self {
        Self {
            login,
            features,
            batch_delay: Duration::ZERO,
            fail_heartbeats: AtomicBool::new(false),
            logins: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
            heartbeats: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Each batch send takes `delay` before it completes.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn heartbeat_count(&self) -> usize {
        self.heartbeats.lock().unwrap().len()
    }

    pub fn batches(&self) -> Vec<Vec<BatchEvent>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SessionTransport for MockTransport {
    async fn login(
        &self,
        _request: &AppLoginRequest,
        token: &str,
        app_name: &str,
    ) -> Result<AppLoginResponse, BackendError> {
        assert_eq!(token, TOKEN);
        assert_eq!(app_name, APP_NAME);
        self.logins.fetch_add(1, Ordering::SeqCst);
        match self.login {
            LoginBehavior::Accept => Ok(AppLoginResponse {
                session_id: SESSION_ID.to_string(),
                status: true,
                pack_id: PACK_ID.to_string(),
                features: self.features.clone(),
                ..AppLoginResponse::default()
            }),
            LoginBehavior::Reject => Err(BackendError::Rejected {
                endpoint: "app-login",
                message: "invalid token".to_string(),
            }),
            LoginBehavior::Hang => std::future::pending().await,
        }
    }

    async fn heartbeat(
        &self,
        session_id: &str,
        request: &AppBeatRequest,
    ) -> Result<AppBeatResponse, BackendError> {
        assert_eq!(session_id, SESSION_ID);
        self.heartbeats.lock().unwrap().push(request.metrics.clone());
        if self.fail_heartbeats.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                endpoint: "app-beat",
                status: 502,
                body: String::new(),
            });
        }
        Ok(AppBeatResponse {
            status: true,
            ..AppBeatResponse::default()
        })
    }

    async fn batch(&self, session_id: &str, batch: &[BatchEvent]) -> Result<(), BackendError> {
        assert_eq!(session_id, SESSION_ID);
        if !self.batch_delay.is_zero() {
            tokio::time::sleep(self.batch_delay).await;
        }
        self.batches.lock().unwrap().push(batch.to_vec());
        self.calls.lock().unwrap().push("batch");
        Ok(())
    }

    async fn logout(&self, session_id: &str) -> Result<(), BackendError> {
        assert_eq!(session_id, SESSION_ID);
        self.logouts.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push("logout");
        Ok(())
    }
}

pub async fn wait_for_state(agent: &Agent, state: AgentState) {
    let mut rx = agent.subscribe();
    rx.wait_for(|s| *s == state)
        .await
        .expect("agent state channel closed");
}

pub async fn wait_for_batches(transport: &MockTransport, n: usize) {
    while transport.batches().len() < n {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
