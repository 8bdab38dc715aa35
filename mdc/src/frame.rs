//! MDC frame layout and reply decoding.
//!
//! Every frame on the wire has the same shape:
//!
//! ```text
//! 0xAA | CMD | DISPLAY_ID | LEN | DATA[LEN] | CHECKSUM
//! ```
//!
//! The checksum is the low byte of the sum of every byte after the header,
//! i.e. `CMD + DISPLAY_ID + LEN + DATA...`.
//!
//! Replies from a display reuse the layout with `CMD = 0xFF` and put the
//! acknowledgement byte (`'A'` or `'N'`) at offset 4.

use std::fmt;

use crate::error::ProtocolError;

/// Leading byte of every frame
pub const HEADER: u8 = 0xAA;

/// Acknowledgement byte for an accepted command (`'A'`)
pub const ACK: u8 = 0x41;

/// Acknowledgement byte for a rejected command (`'N'`)
pub const NAK: u8 = 0x4E;

/// Largest payload the one-byte length field can describe
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Smallest frame worth looking at: header, command, id, length, checksum
pub const MIN_FRAME_LEN: usize = 5;

/// Offset of the acknowledgement byte in a reply
const ACK_OFFSET: usize = 4;

/// Offset of the NAK error code in a reply
const NAK_CODE_OFFSET: usize = 5;

/// Offset of the state byte in an acknowledged status reply
const STATE_OFFSET: usize = 6;

/// Command bytes used by this crate.
pub mod command {
    /// Power control; one data byte sets, no data queries
    pub const POWER: u8 = 0x11;
}

/// Low byte of the sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Build a complete frame for `command` addressed to `display_id`.
pub fn encode(command: u8, payload: &[u8], display_id: u8) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLong(payload.len()));
    }

    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + payload.len());
    frame.push(HEADER);
    frame.push(command);
    frame.push(display_id);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame[1..]));
    Ok(frame)
}

/// Total frame length announced by a buffered prefix, once the length byte has arrived.
pub fn expected_len(prefix: &[u8]) -> Option<usize> {
    prefix
        .get(3)
        .map(|len| MIN_FRAME_LEN + usize::from(*len))
}

/// A decoded MDC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub display_id: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: u8, display_id: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            command,
            display_id,
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self.command, &self.payload, self.display_id)
    }

    /// Parse and validate a complete frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(ProtocolError::TooShort { len: bytes.len() });
        }
        if bytes[0] != HEADER {
            return Err(ProtocolError::BadHeader(bytes[0]));
        }

        let declared = usize::from(bytes[3]);
        let actual = bytes.len() - MIN_FRAME_LEN;
        if declared != actual {
            return Err(ProtocolError::LengthMismatch { declared, actual });
        }

        let (body, trailer) = bytes.split_at(bytes.len() - 1);
        let expected = checksum(&body[1..]);
        if trailer[0] != expected {
            return Err(ProtocolError::BadChecksum {
                expected,
                actual: trailer[0],
            });
        }

        Ok(Self {
            command: bytes[1],
            display_id: bytes[2],
            payload: body[4..].to_vec(),
        })
    }
}

/// Acknowledgement carried by a display reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command accepted; `raw` is the full reply frame
    Ack { raw: Vec<u8> },
    /// Command rejected with a display-specific error code
    Nak { code: u8 },
}

impl Reply {
    /// Classify a reply by its acknowledgement byte.
    ///
    /// Only the acknowledgement is inspected; checksum validation is left to
    /// [`Frame::decode`] because some firmware pads replies.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(ProtocolError::TooShort { len: frame.len() });
        }

        match frame[ACK_OFFSET] {
            ACK => Ok(Reply::Ack {
                raw: frame.to_vec(),
            }),
            NAK => Ok(Reply::Nak {
                code: frame.get(NAK_CODE_OFFSET).copied().unwrap_or(0),
            }),
            other => Err(ProtocolError::UnknownAck(other)),
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Reply::Ack { .. })
    }

    /// Turn a NAK into an error, keeping the ACK frame.
    pub fn into_ack(self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Reply::Ack { raw } => Ok(raw),
            Reply::Nak { code } => Err(ProtocolError::Nak { code }),
        }
    }
}

/// Power state reported by a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    On,
    Off,
    Standby,
    Unknown,
}

impl PowerState {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => PowerState::Off,
            0x01 => PowerState::On,
            0x02 => PowerState::Standby,
            _ => PowerState::Unknown,
        }
    }

    /// Decode the reply to a power status query.
    pub fn from_status_reply(frame: &[u8]) -> Result<Self, ProtocolError> {
        let raw = Reply::decode(frame)?.into_ack()?;
        raw.get(STATE_OFFSET)
            .copied()
            .map(PowerState::from_byte)
            .ok_or(ProtocolError::MissingState)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::On => "ON",
            PowerState::Off => "OFF",
            PowerState::Standby => "STANDBY",
            PowerState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_power_off_frame_bytes() {
        let frame = encode(command::POWER, &[0x00], 0).unwrap();
        assert_eq!(frame, vec![0xAA, 0x11, 0x00, 0x01, 0x00, 0x12]);
    }

    #[test]
    fn test_power_on_frame_bytes() {
        let frame = encode(command::POWER, &[0x01], 0).unwrap();
        assert_eq!(frame, vec![0xAA, 0x11, 0x00, 0x01, 0x01, 0x13]);
    }

    #[test]
    fn test_status_query_has_empty_payload() {
        let frame = encode(command::POWER, &[], 0).unwrap();
        assert_eq!(frame, vec![0xAA, 0x11, 0x00, 0x00, 0x11]);
    }

    #[test]
    fn test_checksum_wraps() {
        let frame = encode(0xFF, &[0xFF, 0xFF], 0xFE).unwrap();
        let expected = ((0xFFu32 + 0xFE + 0x02 + 0xFF + 0xFF) & 0xFF) as u8;
        assert_eq!(*frame.last().unwrap(), expected);
    }

    #[test]
    fn test_payload_too_long() {
        let payload = vec![0u8; 256];
        assert_eq!(
            encode(command::POWER, &payload, 0),
            Err(ProtocolError::PayloadTooLong(256))
        );
    }

    #[test]
    fn test_expected_len() {
        assert_eq!(expected_len(&[0xAA, 0xFF, 0x00]), None);
        assert_eq!(expected_len(&[0xAA, 0xFF, 0x00, 0x03]), Some(8));
    }

    #[test]
    fn test_frame_decode_rejects_bad_checksum() {
        let mut frame = encode(command::POWER, &[0x01], 3).unwrap();
        *frame.last_mut().unwrap() ^= 0xFF;
        assert!(matches!(
            Frame::decode(&frame),
            Err(ProtocolError::BadChecksum { .. })
        ));
    }

    #[test]
    fn test_frame_decode_rejects_bad_header() {
        let mut frame = encode(command::POWER, &[0x01], 3).unwrap();
        frame[0] = 0xAB;
        assert_eq!(Frame::decode(&frame), Err(ProtocolError::BadHeader(0xAB)));
    }

    #[test]
    fn test_frame_decode_rejects_truncated() {
        let frame = encode(command::POWER, &[0x01, 0x02], 3).unwrap();
        assert!(matches!(
            Frame::decode(&frame[..frame.len() - 1]),
            Err(ProtocolError::LengthMismatch { declared: 2, actual: 1 })
        ));
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&[0xAA], 1)]
    #[case(&[0xAA, 0xFF, 0x00, 0x03], 4)]
    fn test_reply_too_short(#[case] bytes: &[u8], #[case] len: usize) {
        assert_eq!(Reply::decode(bytes), Err(ProtocolError::TooShort { len }));
    }

    #[test]
    fn test_reply_ack() {
        let bytes = [0xAA, 0xFF, 0x00, 0x03, 0x41, 0x11, 0x01, 0x55];
        let reply = Reply::decode(&bytes).unwrap();
        assert!(reply.is_ack());
        assert_eq!(reply.into_ack().unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_reply_nak_reads_code() {
        let bytes = [0xAA, 0xFF, 0x00, 0x03, 0x4E, 0x02, 0x11, 0x00];
        assert_eq!(Reply::decode(&bytes), Ok(Reply::Nak { code: 0x02 }));
        assert_eq!(
            Reply::decode(&bytes).unwrap().into_ack(),
            Err(ProtocolError::Nak { code: 0x02 })
        );
    }

    #[test]
    fn test_reply_unknown_ack() {
        let bytes = [0xAA, 0xFF, 0x00, 0x01, 0x3F, 0x00];
        assert_eq!(Reply::decode(&bytes), Err(ProtocolError::UnknownAck(0x3F)));
    }

    #[rstest]
    #[case(0x00, PowerState::Off)]
    #[case(0x01, PowerState::On)]
    #[case(0x02, PowerState::Standby)]
    #[case(0x03, PowerState::Unknown)]
    #[case(0xFF, PowerState::Unknown)]
    fn test_status_reply_state_byte(#[case] byte: u8, #[case] expected: PowerState) {
        let bytes = [0xAA, 0xFF, 0x00, 0x03, 0x41, 0x11, byte, 0x00];
        assert_eq!(PowerState::from_status_reply(&bytes), Ok(expected));
    }

    #[test]
    fn test_status_reply_without_state_byte() {
        let bytes = [0xAA, 0xFF, 0x00, 0x01, 0x41, 0x11];
        assert_eq!(
            PowerState::from_status_reply(&bytes),
            Err(ProtocolError::MissingState)
        );
    }

    #[test]
    fn test_power_state_display() {
        assert_eq!(PowerState::Standby.to_string(), "STANDBY");
        assert_eq!(PowerState::Unknown.as_str(), "UNKNOWN");
    }

    proptest! {
        #[test]
        fn prop_encode_decode_recovers_fields(
            cmd in any::<u8>(),
            id in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=252),
        ) {
            let bytes = encode(cmd, &payload, id).unwrap();
            let frame = Frame::decode(&bytes).unwrap();
            prop_assert_eq!(frame.command, cmd);
            prop_assert_eq!(frame.display_id, id);
            prop_assert_eq!(frame.payload, payload);
        }

        #[test]
        fn prop_checksum_ignores_header(
            cmd in any::<u8>(),
            id in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=64),
        ) {
            let first = encode(cmd, &payload, id).unwrap();
            let second = encode(cmd, &payload, id).unwrap();
            prop_assert_eq!(first.last(), second.last());

            let body = &first[1..first.len() - 1];
            prop_assert_eq!(*first.last().unwrap(), checksum(body));
        }
    }
}
