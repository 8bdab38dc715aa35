//! Per-call TCP sessions against an MDC display.
//!
//! An [`MdcClient`] is only an address book entry: every request opens a fresh
//! TCP connection, writes one frame, reads exactly one reply frame and closes.
//! Nothing is pooled or kept between calls.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{MdcError, Result};
use crate::frame::{self, command, PowerState, Reply};

/// Default MDC control port
pub const DEFAULT_PORT: u16 = 1515;

/// Default exchange deadline (connect + write + read)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single reply frame
const MAX_REPLY_LEN: usize = frame::MIN_FRAME_LEN + frame::MAX_PAYLOAD;

/// Connection parameters for one display.
#[derive(Debug, Clone)]
pub struct MdcClient {
    host: String,
    port: u16,
    display_id: u8,
    timeout: Duration,
}

impl MdcClient {
    /// Create a client for `host` with the default port, display id 0 and a 5s deadline.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            display_id: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_display_id(mut self, display_id: u8) -> Self {
        self.display_id = display_id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn display_id(&self) -> u8 {
        self.display_id
    }

    /// Send one command and return the raw reply frame.
    ///
    /// The whole exchange runs under the client deadline; expiry is reported as
    /// [`MdcError::Timeout`], never as a decoded state.
    pub async fn send(&self, command: u8, data: &[u8]) -> Result<Vec<u8>> {
        let request = frame::encode(command, data, self.display_id)?;

        match tokio::time::timeout(self.timeout, self.exchange(&request)).await {
            Ok(result) => result,
            Err(_) => Err(MdcError::Timeout {
                host: self.host.clone(),
                after: self.timeout,
            }),
        }
    }

    /// Turn the display on.
    pub async fn power_on(&self) -> Result<()> {
        self.set_power(0x01).await
    }

    /// Turn the display off.
    pub async fn power_off(&self) -> Result<()> {
        self.set_power(0x00).await
    }

    /// Ask the display for its power state.
    pub async fn query_power(&self) -> Result<PowerState> {
        let reply = self.send(command::POWER, &[]).await?;
        let state = PowerState::from_status_reply(&reply)?;
        tracing::debug!(host = %self.host, %state, "MDC power status");
        Ok(state)
    }

    async fn set_power(&self, value: u8) -> Result<()> {
        let reply = self.send(command::POWER, &[value]).await?;
        Reply::decode(&reply)?.into_ack()?;
        Ok(())
    }

    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|source| MdcError::Connect {
                host: self.host.clone(),
                source,
            })?;

        tracing::trace!(host = %self.host, frame = ?request, "MDC send");
        stream.write_all(request).await?;

        let reply = read_reply(&mut stream).await?;
        tracing::trace!(host = %self.host, frame = ?reply, "MDC recv");

        // Best effort; the reply is already in hand.
        let _ = stream.shutdown().await;
        Ok(reply)
    }
}

/// Read until one full frame has arrived or the peer stops sending.
///
/// A peer that closes early leaves a short buffer behind, which the reply
/// decoder reports as a protocol error.
async fn read_reply(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut reply = Vec::with_capacity(16);
    let mut chunk = [0u8; 64];

    loop {
        if let Some(total) = frame::expected_len(&reply) {
            if reply.len() >= total {
                reply.truncate(total);
                break;
            }
        }
        if reply.len() >= MAX_REPLY_LEN {
            break;
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&chunk[..n]);
    }

    Ok(reply)
}
