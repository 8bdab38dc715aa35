//! Network locator for roomctl devices
//!
//! DHCP moves devices around, so records are keyed by hardware address and
//! the current IPv4 address is looked up on demand. This crate does that by
//! reading the operating system's ARP cache after probing the local /24.
//!
//! # Quick Start
//!
//! ```no_run
//! use roomctl_discovery::{LocatorConfig, MacAddr, NetworkLocator};
//!
//! # async fn example() -> roomctl_discovery::Result<()> {
//! let locator = NetworkLocator::new(LocatorConfig::default());
//! let mac: MacAddr = "00:1a:2b:3c:4d:5e".parse()?;
//!
//! let found = locator.resolve_ip_from_mac(&mac, None).await?;
//! println!("{} is at {} ({:?})", found.mac, found.ip, found.strategy);
//! # Ok(())
//! # }
//! ```
//!
//! # Probe-first
//!
//! When the devices you look for listen on a known port, give the locator a
//! [`TcpProbe`] so only hosts that actually run the service are considered:
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use roomctl_discovery::{LocatorConfig, NetworkLocator, TcpProbe};
//!
//! let locator = NetworkLocator::new(LocatorConfig::default())
//!     .with_service_probe(Arc::new(TcpProbe::new(1515, Duration::from_millis(100))));
//! ```

mod error;
mod locator;
mod mac;
mod subnet;
pub mod arp;
pub mod probe;

pub use arp::{ArpCache, ArpEntry, SystemArpCache};
pub use error::{LocatorError, Result};
pub use locator::{AddressResolver, LocatorConfig, NetworkLocator, Resolution, Strategy};
pub use mac::MacAddr;
pub use probe::{PingProbe, Prober, TcpProbe};
pub use subnet::{detect_local_subnet, local_subnet_or_default, Subnet24, DEFAULT_SUBNET};
