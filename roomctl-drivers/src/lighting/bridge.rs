//! HTTP/JSON adapter to a local lighting bridge.
//!
//! The bridge speaks the vendor's cloud and local protocols on our behalf
//! and exposes a small REST surface:
//!
//! * `POST /login` with `{username, password, ip}` returns `{token}`
//! * `GET /devices/{ip}/info` returns a [`LightInfo`]
//! * `POST /devices/{ip}/on` and `POST /devices/{ip}/off`
//!
//! Device calls carry the token as a bearer header. Failures come back as
//! `{error_code, msg}` and surface as [`DriverError::Vendor`].

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{LightCredentials, LightInfo, LightingBackend, LightingSession};
use crate::error::{DriverError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    ip: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct VendorFailure {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    msg: String,
}

/// Lighting backend that talks to a bridge over HTTP.
#[derive(Debug, Clone)]
pub struct BridgeBackend {
    base_url: String,
    http: reqwest::Client,
}

impl BridgeBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| DriverError::InvalidConfig(e.to_string()))?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LightingBackend for BridgeBackend {
    async fn login(
        &self,
        credentials: &LightCredentials,
        ip: Ipv4Addr,
    ) -> Result<Box<dyn LightingSession>> {
        let response = self
            .http
            .post(format!("{}/login", self.base_url))
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
                ip: ip.to_string(),
            })
            .send()
            .await?;

        let login: LoginResponse = check(response).await?.json().await?;
        tracing::debug!(%ip, "bridge login ok");

        Ok(Box::new(BridgeSession {
            device_url: format!("{}/devices/{}", self.base_url, ip),
            token: login.token,
            http: self.http.clone(),
        }))
    }
}

struct BridgeSession {
    device_url: String,
    token: String,
    http: reqwest::Client,
}

impl BridgeSession {
    async fn command(&self, action: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/{}", self.device_url, action))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl LightingSession for BridgeSession {
    async fn turn_on(&self) -> Result<()> {
        self.command("on").await
    }

    async fn turn_off(&self) -> Result<()> {
        self.command("off").await
    }

    async fn get_info(&self) -> Result<LightInfo> {
        let response = self
            .http
            .get(format!("{}/info", self.device_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turn a non-2xx response into a vendor error carrying the bridge's message.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<VendorFailure>(&body) {
        Ok(failure) if !failure.msg.is_empty() => {
            tracing::debug!(code = failure.error_code, %status, "bridge reported failure");
            failure.msg
        }
        _ if !body.is_empty() => body,
        _ => status.to_string(),
    };
    Err(DriverError::vendor(message))
}
