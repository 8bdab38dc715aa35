//! Error types for address resolution.

use crate::mac::MacAddr;

/// Error type for locator operations.
#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    /// Neither resolution strategy produced a match
    #[error("MAC address {mac} not found on network")]
    NotFound { mac: MacAddr },

    /// Input could not be parsed as a hardware address
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    /// Input could not be parsed as a /24 subnet
    #[error("Invalid subnet: {0}")]
    InvalidSubnet(String),

    /// The OS address-resolution cache could not be read
    #[error("Address-resolution cache unavailable: {0}")]
    ArpUnavailable(String),

    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias for locator operations.
pub type Result<T> = std::result::Result<T, LocatorError>;
