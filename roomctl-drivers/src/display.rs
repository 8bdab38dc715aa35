//! MDC driver for displays and projectors.

use std::time::Duration;

use async_trait::async_trait;
use mdc::MdcClient;

use crate::error::Result;
use crate::power::{PowerControl, PowerState};

/// Connection settings shared by every MDC device.
#[derive(Debug, Clone)]
pub struct MdcSettings {
    pub port: u16,
    pub display_id: u8,
    pub timeout: Duration,
}

impl Default for MdcSettings {
    fn default() -> Self {
        Self {
            port: mdc::DEFAULT_PORT,
            display_id: 0,
            timeout: mdc::DEFAULT_TIMEOUT,
        }
    }
}

/// Display or projector reachable over MDC.
#[derive(Debug, Clone)]
pub struct DisplayDriver {
    client: MdcClient,
}

impl DisplayDriver {
    pub fn new(host: impl Into<String>, settings: &MdcSettings) -> Self {
        let client = MdcClient::new(host)
            .with_port(settings.port)
            .with_display_id(settings.display_id)
            .with_timeout(settings.timeout);
        Self { client }
    }

    pub fn host(&self) -> &str {
        self.client.host()
    }
}

#[async_trait]
impl PowerControl for DisplayDriver {
    async fn power_on(&self) -> Result<()> {
        self.client.power_on().await?;
        tracing::info!(host = %self.host(), "display powered on");
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        self.client.power_off().await?;
        tracing::info!(host = %self.host(), "display powered off");
        Ok(())
    }

    async fn query_state(&self) -> Result<PowerState> {
        Ok(self.client.query_power().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn fake_display(reply: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 16];
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(reply).await.unwrap();
        });
        port
    }

    fn settings(port: u16) -> MdcSettings {
        MdcSettings {
            port,
            timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_query_state_on() {
        let port = fake_display(&[0xAA, 0xFF, 0x00, 0x03, 0x41, 0x11, 0x01, 0x55]).await;
        let driver = DisplayDriver::new("127.0.0.1", &settings(port));
        assert_eq!(driver.query_state().await.unwrap(), PowerState::On);
    }

    #[tokio::test]
    async fn test_nak_is_protocol_error() {
        let port = fake_display(&[0xAA, 0xFF, 0x00, 0x03, 0x4E, 0x11, 0x01, 0x62]).await;
        let driver = DisplayDriver::new("127.0.0.1", &settings(port));
        let err = driver.power_on().await.unwrap_err();
        assert!(matches!(err, DriverError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_unreachable_is_transient_not_off() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let driver = DisplayDriver::new("127.0.0.1", &settings(port));
        let err = driver.query_state().await.unwrap_err();
        assert!(err.is_transient());
    }
}
