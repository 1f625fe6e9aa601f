//! Backend session transport: login, heartbeat, batch delivery and logout.

pub mod api;
mod client;

pub use client::BackendClient;

use crate::error::BackendError;
use api::{AppBeatRequest, AppBeatResponse, AppLoginRequest, AppLoginResponse, BatchEvent};
use async_trait::async_trait;

/// The four remote operations of a backend session.
///
/// Only `login` carries the application credentials; the others are bound to the
/// session identifier it returned. Implementations never retry.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn login(
        &self,
        request: &AppLoginRequest,
        token: &str,
        app_name: &str,
    ) -> Result<AppLoginResponse, BackendError>;

    async fn heartbeat(
        &self,
        session_id: &str,
        request: &AppBeatRequest,
    ) -> Result<AppBeatResponse, BackendError>;

    /// Deliver an ordered batch of tagged events.
    async fn batch(&self, session_id: &str, batch: &[BatchEvent]) -> Result<(), BackendError>;

    async fn logout(&self, session_id: &str) -> Result<(), BackendError>;
}
