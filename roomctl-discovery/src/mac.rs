//! Hardware address type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LocatorError;

/// A 48-bit hardware address.
///
/// Parsing is case-insensitive and accepts the separators different tools
/// print (`aa:bb:..`, `AA-BB-..`, `aabb.ccdd.eeff`, bare hex). Display is
/// always lowercase colon form, so two addresses compare equal exactly when
/// their normalized forms do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// All-zero addresses show up for incomplete ARP entries.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }
}

impl FromStr for MacAddr {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || LocatorError::InvalidMac(s.to_string());

        let groups: Vec<&str> = if trimmed.contains(':') {
            trimmed.split(':').collect()
        } else if trimmed.contains('-') {
            trimmed.split('-').collect()
        } else if trimmed.contains('.') {
            // Cisco style: three groups of four digits
            let parts: Vec<&str> = trimmed.split('.').collect();
            if parts.len() != 3 || parts.iter().any(|p| p.len() != 4 || !p.is_ascii()) {
                return Err(invalid());
            }
            parts
                .iter()
                .flat_map(|p| [&p[..2], &p[2..]])
                .collect()
        } else {
            if trimmed.len() != 12 || !trimmed.is_ascii() {
                return Err(invalid());
            }
            (0..6).map(|i| &trimmed[i * 2..i * 2 + 2]).collect()
        };

        if groups.len() != 6 {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (octet, group) in octets.iter_mut().zip(groups) {
            // macOS prints single-digit octets ("0:1a:..")
            if group.is_empty() || group.len() > 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EXPECTED: MacAddr = MacAddr::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);

    #[rstest]
    #[case("00:1a:2b:3c:4d:5e")]
    #[case("00:1A:2B:3C:4D:5E")]
    #[case("00-1a-2b-3c-4d-5e")]
    #[case("001a2b3c4d5e")]
    #[case("001a.2b3c.4d5e")]
    #[case("0:1a:2b:3c:4d:5e")]
    #[case("  00:1a:2b:3c:4d:5e ")]
    fn test_parse_accepts_common_forms(#[case] input: &str) {
        assert_eq!(input.parse::<MacAddr>().unwrap(), EXPECTED);
    }

    #[rstest]
    #[case("")]
    #[case("dynamic")]
    #[case("00:1a:2b:3c:4d")]
    #[case("00:1a:2b:3c:4d:5e:6f")]
    #[case("00:1a:2b:3c:4d:zz")]
    #[case("001a2b3c4d5")]
    #[case("000:1a:2b:3c:4d:5e")]
    fn test_parse_rejects_garbage(#[case] input: &str) {
        assert!(input.parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_display_is_lowercase_colon() {
        let mac: MacAddr = "AA-BB-CC-DD-EE-FF".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
        assert!(mac.is_broadcast());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let json = serde_json::to_string(&EXPECTED).unwrap();
        assert_eq!(json, "\"00:1a:2b:3c:4d:5e\"");
        let back: MacAddr = serde_json::from_str("\"00-1A-2B-3C-4D-5E\"").unwrap();
        assert_eq!(back, EXPECTED);
    }
}
