//! Reachability probes.
//!
//! A probe's only job is to make the kernel resolve the target's hardware
//! address (and, for a TCP probe, to confirm a service is listening). The
//! locator bounds every probe with its own timeout, so implementations may
//! take as long as they like.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;

/// Something that can tell whether a host answers.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, ip: Ipv4Addr) -> bool;
}

/// TCP connect probe against a known service port.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl Prober for TcpProbe {
    async fn probe(&self, ip: Ipv4Addr) -> bool {
        let addr = SocketAddr::from((ip, self.port));
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        )
    }
}

/// ICMP echo via the system `ping` binary.
///
/// Raw sockets need privileges, the binary doesn't.
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(&self, ip: Ipv4Addr) -> Command {
        let mut cmd = Command::new("ping");
        let millis = self.timeout.as_millis().max(1);

        if cfg!(target_os = "windows") {
            cmd.args(["-n", "1", "-w", &millis.to_string()]);
        } else if cfg!(target_os = "macos") {
            cmd.args(["-c", "1", "-W", &millis.to_string()]);
        } else {
            // Linux ping takes whole seconds
            let secs = self.timeout.as_secs().max(1);
            cmd.args(["-c", "1", "-W", &secs.to_string()]);
        }

        cmd.arg(ip.to_string())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Prober for PingProbe {
    async fn probe(&self, ip: Ipv4Addr) -> bool {
        match self.command(ip).status().await {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::trace!(%ip, error = %e, "ping failed to spawn");
                false
            }
        }
    }
}
