//! Smart lights behind a vendor backend.
//!
//! The vendor protocol lives entirely behind [`LightingBackend`]; the rest of
//! the system only sees a session that can turn a light on, off, or describe
//! it. Every operation logs in afresh, so no vendor session outlives a call.

mod bridge;

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::power::{PowerControl, PowerState};

pub use bridge::BridgeBackend;

/// Vendor account used to log in to a light.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightCredentials {
    pub username: String,
    pub password: String,
}

impl LightCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// `self` unless it is empty, then `fallback`.
    pub fn or(self, fallback: &LightCredentials) -> LightCredentials {
        if self.is_empty() {
            fallback.clone()
        } else {
            self
        }
    }
}

/// What a light reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightInfo {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub device_on: Option<bool>,
}

/// An authenticated connection to one light.
#[async_trait]
pub trait LightingSession: Send + Sync {
    async fn turn_on(&self) -> Result<()>;
    async fn turn_off(&self) -> Result<()>;
    async fn get_info(&self) -> Result<LightInfo>;
}

/// A vendor backend that can open sessions to lights by address.
#[async_trait]
pub trait LightingBackend: Send + Sync {
    async fn login(
        &self,
        credentials: &LightCredentials,
        ip: Ipv4Addr,
    ) -> Result<Box<dyn LightingSession>>;
}

/// Power control for one light.
#[derive(Clone)]
pub struct LightingDriver {
    backend: Arc<dyn LightingBackend>,
    credentials: LightCredentials,
    ip: Ipv4Addr,
}

impl LightingDriver {
    pub fn new(backend: Arc<dyn LightingBackend>, credentials: LightCredentials, ip: Ipv4Addr) -> Self {
        Self {
            backend,
            credentials,
            ip,
        }
    }

    /// Log in and confirm the light answers before acting on it.
    async fn session(&self) -> Result<(Box<dyn LightingSession>, LightInfo)> {
        let session = self.backend.login(&self.credentials, self.ip).await?;
        let info = session.get_info().await?;
        tracing::debug!(ip = %self.ip, model = ?info.model, "light session opened");
        Ok((session, info))
    }
}

#[async_trait]
impl PowerControl for LightingDriver {
    async fn power_on(&self) -> Result<()> {
        let (session, _) = self.session().await?;
        session.turn_on().await?;
        tracing::info!(ip = %self.ip, "light turned on");
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        let (session, _) = self.session().await?;
        session.turn_off().await?;
        tracing::info!(ip = %self.ip, "light turned off");
        Ok(())
    }

    async fn query_state(&self) -> Result<PowerState> {
        let (_, info) = self.session().await?;
        Ok(match info.device_on {
            Some(true) => PowerState::On,
            Some(false) => PowerState::Off,
            None => PowerState::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_info: bool,
    }

    struct RecordingSession(Arc<Recorder>);

    #[async_trait]
    impl LightingSession for RecordingSession {
        async fn turn_on(&self) -> Result<()> {
            self.0.calls.lock().unwrap().push("on".into());
            Ok(())
        }

        async fn turn_off(&self) -> Result<()> {
            self.0.calls.lock().unwrap().push("off".into());
            Ok(())
        }

        async fn get_info(&self) -> Result<LightInfo> {
            self.0.calls.lock().unwrap().push("info".into());
            if self.0.fail_info {
                return Err(DriverError::vendor("Device not responding"));
            }
            Ok(LightInfo {
                device_on: Some(true),
                ..Default::default()
            })
        }
    }

    struct RecordingBackend(Arc<Recorder>);

    #[async_trait]
    impl LightingBackend for RecordingBackend {
        async fn login(
            &self,
            credentials: &LightCredentials,
            ip: Ipv4Addr,
        ) -> Result<Box<dyn LightingSession>> {
            self.0
                .calls
                .lock()
                .unwrap()
                .push(format!("login {} {}", credentials.username, ip));
            Ok(Box::new(RecordingSession(self.0.clone())))
        }
    }

    fn driver(recorder: Arc<Recorder>) -> LightingDriver {
        LightingDriver::new(
            Arc::new(RecordingBackend(recorder)),
            LightCredentials::new("ops@example.com", "secret"),
            Ipv4Addr::new(10, 0, 0, 30),
        )
    }

    #[tokio::test]
    async fn test_power_on_logs_in_checks_then_acts() {
        let recorder = Arc::new(Recorder::default());
        driver(recorder.clone()).power_on().await.unwrap();

        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["login ops@example.com 10.0.0.30", "info", "on"]);
    }

    #[tokio::test]
    async fn test_info_failure_stops_before_action() {
        let recorder = Arc::new(Recorder {
            fail_info: true,
            ..Default::default()
        });
        let err = driver(recorder.clone()).power_off().await.unwrap_err();

        assert_eq!(err.to_string(), "Vendor error: Device not responding");
        assert!(!recorder.calls.lock().unwrap().contains(&"off".to_string()));
    }

    #[tokio::test]
    async fn test_query_state_from_info() {
        let recorder = Arc::new(Recorder::default());
        assert_eq!(driver(recorder).query_state().await.unwrap(), PowerState::On);
    }

    #[test]
    fn test_credentials_fallback() {
        let defaults = LightCredentials::new("default", "pw");
        assert_eq!(LightCredentials::default().or(&defaults), defaults);

        let own = LightCredentials::new("own", "pw2");
        assert_eq!(own.clone().or(&defaults), own);
    }
}
