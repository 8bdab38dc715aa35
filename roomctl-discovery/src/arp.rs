//! Reading the operating system's address-resolution cache.

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::{LocatorError, Result};
use crate::mac::MacAddr;

const PROC_NET_ARP: &str = "/proc/net/arp";

/// One IPv4 to hardware address binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// Snapshot source for IP/MAC bindings.
#[async_trait]
pub trait ArpCache: Send + Sync {
    async fn entries(&self) -> Result<Vec<ArpEntry>>;
}

/// The host's ARP table.
///
/// Reads `/proc/net/arp` where it exists and falls back to the `arp -a`
/// command everywhere else.
#[derive(Debug, Clone, Default)]
pub struct SystemArpCache;

impl SystemArpCache {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArpCache for SystemArpCache {
    async fn entries(&self) -> Result<Vec<ArpEntry>> {
        if let Ok(table) = tokio::fs::read_to_string(PROC_NET_ARP).await {
            return Ok(parse_proc_arp(&table));
        }

        let output = tokio::process::Command::new("arp")
            .arg("-a")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| LocatorError::ArpUnavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(LocatorError::ArpUnavailable(format!(
                "arp -a exited with {}",
                output.status
            )));
        }

        Ok(parse_arp_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse the Linux `/proc/net/arp` table.
///
/// Incomplete entries (flags `0x0`) and all-zero addresses are skipped.
pub fn parse_proc_arp(table: &str) -> Vec<ArpEntry> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 || cols[2] == "0x0" {
                return None;
            }
            let ip = cols[0].parse().ok()?;
            let mac: MacAddr = cols[3].parse().ok()?;
            (!mac.is_zero()).then_some(ArpEntry { ip, mac })
        })
        .collect()
}

/// Parse `arp -a` output from Linux, macOS or Windows.
///
/// The formats differ in layout but every useful line carries one IPv4
/// address (bare or in parentheses) followed by one hardware address, so
/// the parser scans tokens rather than columns.
pub fn parse_arp_output(output: &str) -> Vec<ArpEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut ip = None;
            let mut mac = None;
            for token in line.split_whitespace() {
                let token = token.trim_matches(|c| c == '(' || c == ')');
                if ip.is_none() {
                    ip = token.parse::<Ipv4Addr>().ok();
                } else if mac.is_none() {
                    mac = token.parse::<MacAddr>().ok();
                }
            }
            let entry = ArpEntry {
                ip: ip?,
                mac: mac?,
            };
            (!entry.mac.is_zero() && !entry.mac.is_broadcast()).then_some(entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_arp() {
        let table = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.20     0x1         0x2         00:1a:2b:3c:4d:5e     *        eth0
192.168.1.21     0x1         0x0         00:00:00:00:00:00     *        eth0
192.168.1.1      0x1         0x2         a4:91:b1:00:00:01     *        eth0
";
        let entries = parse_proc_arp(table);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].ip, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(entries[0].mac.to_string(), "00:1a:2b:3c:4d:5e");
        assert_eq!(entries[1].ip, Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn test_parse_linux_arp_a() {
        let output = "\
? (192.168.1.20) at 00:1a:2b:3c:4d:5e [ether] on eth0
? (192.168.1.30) at <incomplete> on eth0
";
        let entries = parse_arp_output(output);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip, Ipv4Addr::new(192, 168, 1, 20));
    }

    #[test]
    fn test_parse_macos_arp_a() {
        let output = "\
? (10.0.0.5) at 0:1a:2b:3c:4d:5e on en0 ifscope [ethernet]
? (10.0.0.255) at ff:ff:ff:ff:ff:ff on en0 ifscope [ethernet]
";
        let entries = parse_arp_output(output);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(entries[0].mac.to_string(), "00:1a:2b:3c:4d:5e");
    }

    #[test]
    fn test_parse_windows_arp_a() {
        let output = "\
Interface: 192.168.1.10 --- 0xb
  Internet Address      Physical Address      Type
  192.168.1.1           a4-91-b1-00-00-01     dynamic
  192.168.1.20          00-1a-2b-3c-4d-5e     dynamic
";
        let entries = parse_arp_output(output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].ip, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(entries[1].mac.to_string(), "00:1a:2b:3c:4d:5e");
    }
}
