use mdc::MdcError;
use thiserror::Error;

/// Errors raised by device drivers
///
/// Callers must be able to tell "the device could not be reached" apart
/// from "the device answered and said something", so network trouble and
/// protocol trouble are separate variants.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The device answered with something we couldn't use
    ///
    /// Malformed or short frames, bad checksums and NAK replies all land here.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The device could not be reached
    ///
    /// Timeouts and refused or reset connections. Not fatal; listings
    /// degrade the device to a placeholder state instead of failing.
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// A third-party backend reported a failure
    ///
    /// The vendor's message is passed through unchanged.
    #[error("Vendor error: {message}")]
    Vendor { message: String },

    /// The driver can't perform this operation for this kind of device
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The device record is missing something the driver needs
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DriverError {
    pub fn vendor(message: impl Into<String>) -> Self {
        Self::Vendor {
            message: message.into(),
        }
    }

    /// True when retrying later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }
}

/// Type alias for results that can return a DriverError
pub type Result<T> = std::result::Result<T, DriverError>;

impl From<MdcError> for DriverError {
    fn from(error: MdcError) -> Self {
        if error.is_transient() {
            DriverError::TransientNetwork(error.to_string())
        } else {
            DriverError::Protocol(error.to_string())
        }
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            DriverError::vendor(format!("unreadable response: {error}"))
        } else {
            DriverError::TransientNetwork(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdc::ProtocolError;
    use std::time::Duration;

    #[test]
    fn test_mdc_timeout_is_transient() {
        let err: DriverError = MdcError::Timeout {
            host: "10.0.0.20".into(),
            after: Duration::from_secs(5),
        }
        .into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_mdc_nak_is_protocol() {
        let err: DriverError = MdcError::Protocol(ProtocolError::Nak { code: 2 }).into();
        assert!(matches!(err, DriverError::Protocol(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_vendor_message_passthrough() {
        let err = DriverError::vendor("Device offline");
        assert_eq!(err.to_string(), "Vendor error: Device offline");
    }
}
