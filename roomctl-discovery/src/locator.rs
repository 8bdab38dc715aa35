//! Resolving hardware addresses to current IPv4 addresses and back.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use crate::arp::{ArpCache, ArpEntry, SystemArpCache};
use crate::error::{LocatorError, Result};
use crate::mac::MacAddr;
use crate::probe::{PingProbe, Prober};
use crate::subnet::{local_subnet_or_default, Subnet24};

/// Tuning for resolution.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Upper bound on any single probe
    pub probe_timeout: Duration,
    /// Wait between a single probe and reading the cache
    pub arp_settle: Duration,
    /// Wait between a full sweep and reading the cache
    pub sweep_settle: Duration,
    /// Subnet to sweep when the caller doesn't name one
    pub subnet: Option<Subnet24>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(100),
            arp_settle: Duration::from_millis(100),
            sweep_settle: Duration::from_secs(1),
            subnet: None,
        }
    }
}

/// How a [`Resolution`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A host answered the service probe and its cached mac matched
    ProbeMatched,
    /// The mac turned up in the cache after a full sweep
    ArpTableMatched,
}

/// Result of a mac to ip lookup. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub strategy: Strategy,
}

/// Address resolution as seen by the rest of the system.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Find the current IPv4 address of `mac` on the local /24.
    async fn resolve_ip(&self, mac: &MacAddr) -> Result<Resolution>;

    /// Find the hardware address behind `ip`, if the host answers.
    async fn resolve_mac(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>>;
}

/// ARP-based locator.
///
/// Strategies, in order:
/// 1. probe-first: sweep the /24 with the service probe (if one is set),
///    then match reachable hosts against the cache
/// 2. sweep-fallback: sweep with the generic probe, let the cache settle,
///    then scan all of it
///
/// Several hosts can claim the same mac (proxies, spoofing). The lowest
/// address wins, so repeated lookups agree with each other.
#[derive(Clone)]
pub struct NetworkLocator {
    arp: Arc<dyn ArpCache>,
    sweep_probe: Arc<dyn Prober>,
    service_probe: Option<Arc<dyn Prober>>,
    config: LocatorConfig,
}

impl NetworkLocator {
    /// Locator over the system ARP table and `ping`.
    pub fn new(config: LocatorConfig) -> Self {
        let ping = PingProbe::new(config.probe_timeout);
        Self::with_parts(Arc::new(SystemArpCache::new()), Arc::new(ping), config)
    }

    pub fn with_parts(
        arp: Arc<dyn ArpCache>,
        sweep_probe: Arc<dyn Prober>,
        config: LocatorConfig,
    ) -> Self {
        Self {
            arp,
            sweep_probe,
            service_probe: None,
            config,
        }
    }

    /// Enable the probe-first strategy with a protocol-specific probe.
    pub fn with_service_probe(mut self, probe: Arc<dyn Prober>) -> Self {
        self.service_probe = Some(probe);
        self
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Probe `ip` once, wait for the cache, and look it up.
    pub async fn resolve_mac_from_ip(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>> {
        let _ = tokio::time::timeout(self.config.probe_timeout, self.sweep_probe.probe(ip)).await;
        tokio::time::sleep(self.config.arp_settle).await;

        let entries = self.arp.entries().await?;
        let mac = entries.iter().find(|e| e.ip == ip).map(|e| e.mac);
        tracing::debug!(%ip, mac = ?mac.map(|m| m.to_string()), "resolved mac from ip");
        Ok(mac)
    }

    /// Locate `mac` in `subnet` (or the configured/detected one).
    pub async fn resolve_ip_from_mac(
        &self,
        mac: &MacAddr,
        subnet: Option<Subnet24>,
    ) -> Result<Resolution> {
        let subnet = subnet
            .or(self.config.subnet)
            .unwrap_or_else(local_subnet_or_default);

        if let Some(probe) = &self.service_probe {
            let reachable = self.sweep(probe.as_ref(), subnet).await;
            tracing::debug!(%subnet, reachable = reachable.len(), "probe-first sweep done");

            if !reachable.is_empty() {
                let entries = self.arp.entries().await?;
                let matched = reachable
                    .iter()
                    .filter(|ip| entries.iter().any(|e| e.ip == **ip && e.mac == *mac))
                    .min();

                if let Some(ip) = matched {
                    return Ok(Resolution {
                        mac: *mac,
                        ip: *ip,
                        strategy: Strategy::ProbeMatched,
                    });
                }
            }
        }

        let answered = self.sweep(self.sweep_probe.as_ref(), subnet).await;
        tracing::debug!(%subnet, answered = answered.len(), "fallback sweep done");
        tokio::time::sleep(self.config.sweep_settle).await;

        let entries = self.arp.entries().await?;
        match pick_entry(&entries, mac, subnet) {
            Some(ip) => Ok(Resolution {
                mac: *mac,
                ip,
                strategy: Strategy::ArpTableMatched,
            }),
            None => Err(LocatorError::NotFound { mac: *mac }),
        }
    }

    /// Probe every host in `subnet` concurrently, each under its own
    /// timeout, and return the ones that answered in address order.
    async fn sweep(&self, probe: &dyn Prober, subnet: Subnet24) -> Vec<Ipv4Addr> {
        let timeout = self.config.probe_timeout;
        let probes = subnet.hosts().map(|ip| async move {
            match tokio::time::timeout(timeout, probe.probe(ip)).await {
                Ok(true) => Some(ip),
                _ => None,
            }
        });

        let mut reachable: Vec<Ipv4Addr> = join_all(probes).await.into_iter().flatten().collect();
        reachable.sort();
        reachable
    }
}

/// Lowest matching address, preferring those inside `subnet`.
fn pick_entry(entries: &[ArpEntry], mac: &MacAddr, subnet: Subnet24) -> Option<Ipv4Addr> {
    let matching = entries.iter().filter(|e| e.mac == *mac).map(|e| e.ip);
    let (inside, outside): (Vec<_>, Vec<_>) = matching.partition(|ip| subnet.contains(*ip));
    inside.into_iter().min().or_else(|| outside.into_iter().min())
}

#[async_trait]
impl AddressResolver for NetworkLocator {
    async fn resolve_ip(&self, mac: &MacAddr) -> Result<Resolution> {
        self.resolve_ip_from_mac(mac, None).await
    }

    async fn resolve_mac(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>> {
        self.resolve_mac_from_ip(ip).await
    }
}
