//! /24 subnet handling.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::str::FromStr;

use crate::error::LocatorError;

/// Prefix used when the local address can't be determined.
pub const DEFAULT_SUBNET: Subnet24 = Subnet24([192, 168, 1]);

/// An IPv4 /24 network, identified by its first three octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet24([u8; 3]);

impl Subnet24 {
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    /// The /24 containing `ip`.
    pub fn of(ip: Ipv4Addr) -> Self {
        let [a, b, c, _] = ip.octets();
        Self([a, b, c])
    }

    /// Host addresses `.1` through `.254`.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        let [a, b, c] = self.0;
        (1..=254u8).map(move |d| Ipv4Addr::new(a, b, c, d))
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        Self::of(ip) == *self
    }
}

impl FromStr for Subnet24 {
    type Err = LocatorError;

    /// Accepts `a.b.c`, `a.b.c.0/24` or any host address `a.b.c.d`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LocatorError::InvalidSubnet(s.to_string());
        let trimmed = s.trim();

        let addr = match trimmed.split_once('/') {
            Some((addr, "24")) => addr,
            Some(_) => return Err(invalid()),
            None => trimmed,
        };

        let octets = addr
            .split('.')
            .map(|part| part.parse::<u8>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        match octets.as_slice() {
            [a, b, c] | [a, b, c, _] => Ok(Self([*a, *b, *c])),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Subnet24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}")
    }
}

/// Detect the /24 of the interface that carries the default route.
///
/// Connecting a UDP socket sends nothing but makes the OS pick a source
/// address, which skips loopback and most virtual adapters.
pub fn detect_local_subnet() -> Option<Subnet24> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() && !ip.is_link_local() => {
            Some(Subnet24::of(ip))
        }
        _ => None,
    }
}

/// [`detect_local_subnet`], falling back to `192.168.1`.
pub fn local_subnet_or_default() -> Subnet24 {
    detect_local_subnet().unwrap_or_else(|| {
        tracing::warn!(default = %DEFAULT_SUBNET, "could not detect local subnet");
        DEFAULT_SUBNET
    })
}
