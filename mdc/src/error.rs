//! Error types for MDC framing and transport.

use std::time::Duration;
use thiserror::Error;

/// A frame could not be built or a reply could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Fewer bytes than the smallest meaningful frame
    #[error("Response too short: {len} bytes")]
    TooShort { len: usize },

    /// First byte was not the 0xAA header
    #[error("Invalid header byte: 0x{0:02x}")]
    BadHeader(u8),

    /// Declared data length does not match the bytes received
    #[error("Length mismatch: header declares {declared} data bytes, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Trailing checksum does not match the frame contents
    #[error("Checksum mismatch: expected 0x{expected:02x}, got 0x{actual:02x}")]
    BadChecksum { expected: u8, actual: u8 },

    /// Display rejected the command
    #[error("NAK received, error code: 0x{code:02x}")]
    Nak { code: u8 },

    /// Acknowledgement byte was neither ACK nor NAK
    #[error("Unknown acknowledgement byte: 0x{0:02x}")]
    UnknownAck(u8),

    /// Payload does not fit in the one-byte length field
    #[error("Payload too long: {0} bytes (max 255)")]
    PayloadTooLong(usize),

    /// Status reply was acknowledged but carried no state byte
    #[error("Status reply carries no state byte")]
    MissingState,
}

/// Errors from a single MDC request/response exchange.
#[derive(Debug, Error)]
pub enum MdcError {
    /// The display answered, but not with something we accept
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No complete reply within the exchange deadline
    #[error("Timed out after {after:?} talking to {host}")]
    Timeout { host: String, after: Duration },

    /// TCP connection could not be established
    #[error("Failed to connect to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket failed mid-exchange
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MdcError {
    /// True when the display could not be reached at all.
    ///
    /// An unreachable display is not the same thing as a display reporting OFF.
    pub fn is_transient(&self) -> bool {
        !matches!(self, MdcError::Protocol(_))
    }
}

/// Convenience Result alias for MDC operations.
pub type Result<T> = std::result::Result<T, MdcError>;
