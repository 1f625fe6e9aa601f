//! HTTP client for the backend API (JSON over HTTPS).

use super::api::{
    AppBeatRequest, AppBeatResponse, AppLoginRequest, AppLoginResponse, BatchEvent, BatchRequest,
};
use super::SessionTransport;
use crate::config::BackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const HEADER_TOKEN: &str = "X-Api-Key";
pub const HEADER_APP_NAME: &str = "X-App-Name";
pub const HEADER_SESSION: &str = "X-Session-Key";

const APP_LOGIN: &str = "app-login";
const APP_BEAT: &str = "app-beat";
const BATCH: &str = "batch";
const APP_LOGOUT: &str = "app-logout";

pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let base_url = config.url.trim_end_matches('/');
        reqwest::Url::parse(base_url).map_err(|e| BackendError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5));
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::https(proxy).map_err(BackendError::ClientBuild)?);
        }
        let client = builder.build().map_err(BackendError::ClientBuild)?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, endpoint)
    }

    fn post<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> RequestBuilder {
        self.client.post(self.url(endpoint)).json(body)
    }

    async fn send(endpoint: &'static str, request: RequestBuilder) -> Result<Response, BackendError> {
        let res = request
            .send()
            .await
            .map_err(|source| BackendError::Request { endpoint, source })?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                endpoint,
                status,
                body,
            });
        }
        debug!(endpoint, "backend request succeeded");
        Ok(res)
    }

    async fn decode<T: DeserializeOwned>(endpoint: &'static str, res: Response) -> Result<T, BackendError> {
        res.json()
            .await
            .map_err(|source| BackendError::Decode { endpoint, source })
    }
}

#[async_trait]
impl SessionTransport for BackendClient {
    async fn login(
        &self,
        request: &AppLoginRequest,
        token: &str,
        app_name: &str,
    ) -> Result<AppLoginResponse, BackendError> {
        let req = self
            .post(APP_LOGIN, request)
            .header(HEADER_TOKEN, token)
            .header(HEADER_APP_NAME, app_name);
        let res: AppLoginResponse = Self::decode(APP_LOGIN, Self::send(APP_LOGIN, req).await?).await?;
        if !res.status {
            return Err(BackendError::Rejected {
                endpoint: APP_LOGIN,
                message: res.error,
            });
        }
        Ok(res)
    }

    async fn heartbeat(
        &self,
        session_id: &str,
        request: &AppBeatRequest,
    ) -> Result<AppBeatResponse, BackendError> {
        let req = self.post(APP_BEAT, request).header(HEADER_SESSION, session_id);
        let res: AppBeatResponse = Self::decode(APP_BEAT, Self::send(APP_BEAT, req).await?).await?;
        if !res.status {
            return Err(BackendError::Rejected {
                endpoint: APP_BEAT,
                message: res.error,
            });
        }
        Ok(res)
    }

    async fn batch(&self, session_id: &str, batch: &[BatchEvent]) -> Result<(), BackendError> {
        let req = self
            .post(BATCH, &BatchRequest { batch })
            .header(HEADER_SESSION, session_id);
        Self::send(BATCH, req).await?;
        Ok(())
    }

    async fn logout(&self, session_id: &str) -> Result<(), BackendError> {
        let req = self
            .client
            .post(self.url(APP_LOGOUT))
            .header(HEADER_SESSION, session_id);
        Self::send(APP_LOGOUT, req).await?;
        Ok(())
    }
}
