//! Wake-on-LAN for computers.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use roomctl_discovery::MacAddr;
use tokio::net::UdpSocket;

use crate::error::{DriverError, Result};
use crate::power::{PowerControl, PowerState};

/// Limited broadcast on the discard port.
pub const DEFAULT_WOL_TARGET: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, 9));

/// Six `0xFF` bytes followed by the target mac sixteen times.
pub fn magic_packet(mac: &MacAddr) -> [u8; 102] {
    let mut packet = [0xFFu8; 102];
    let octets = mac.octets();
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&octets);
    }
    packet
}

/// A computer that can only be woken.
#[derive(Debug, Clone)]
pub struct ComputerDriver {
    mac: MacAddr,
    target: SocketAddr,
}

impl ComputerDriver {
    pub fn new(mac: MacAddr, target: SocketAddr) -> Self {
        Self { mac, target }
    }
}

#[async_trait]
impl PowerControl for ComputerDriver {
    async fn power_on(&self) -> Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| DriverError::TransientNetwork(e.to_string()))?;
        socket
            .set_broadcast(true)
            .map_err(|e| DriverError::TransientNetwork(e.to_string()))?;
        socket
            .send_to(&magic_packet(&self.mac), self.target)
            .await
            .map_err(|e| DriverError::TransientNetwork(e.to_string()))?;

        tracing::info!(mac = %self.mac, target = %self.target, "sent wake-on-lan packet");
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        Err(DriverError::Unsupported("computers cannot be powered off remotely"))
    }

    async fn query_state(&self) -> Result<PowerState> {
        Err(DriverError::Unsupported("computer power state is not queryable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_packet_layout() {
        let mac = MacAddr::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);
        let packet = magic_packet(&mac);

        assert_eq!(&packet[..6], &[0xFF; 6]);
        for i in 0..16 {
            let start = 6 + i * 6;
            assert_eq!(&packet[start..start + 6], &mac.octets());
        }
    }

    #[tokio::test]
    async fn test_power_on_sends_packet() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();
        let mac = MacAddr::new([0x02, 0, 0, 0, 0, 0x07]);

        ComputerDriver::new(mac, target).power_on().await.unwrap();

        let mut buf = [0u8; 128];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 102);
        assert_eq!(&buf[96..102], &mac.octets());
    }

    #[tokio::test]
    async fn test_off_and_query_unsupported() {
        let driver = ComputerDriver::new(MacAddr::new([0x02, 0, 0, 0, 0, 1]), DEFAULT_WOL_TARGET);
        assert!(matches!(driver.power_off().await, Err(DriverError::Unsupported(_))));
        assert!(matches!(driver.query_state().await, Err(DriverError::Unsupported(_))));
    }
}
