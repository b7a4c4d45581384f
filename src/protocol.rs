//! KVST - Binary Wire Protocol (C4)
//! Fixed 16-byte headers for both directions, network byte order.
//!
//! ## Request header (16 bytes)
//! ```text
//! [magic: 4][command: 1][flags: 1][key_length: 4][value_length: 4][sequence_id: 2]
//! ```
//!
//! ## Response header (16 bytes)
//! ```text
//! [magic: 4][status: 1][flags: 1][data_length: 4][reserved: 4][sequence_id: 2]
//! ```
//! The 4-byte reserved gap is kept for wire compatibility even though a
//! clean-room response header would not need it.

use crate::error::KvError;

pub const HEADER_SIZE: usize = 16;

pub const REQUEST_MAGIC: u32 = 0x4B56_5354; // "KVST"
pub const RESPONSE_MAGIC: u32 = 0x4B56_5352; // "KVSR"

/// Maximum key length accepted on the wire.
pub const MAX_KEY_LEN: u32 = 65_535;

/// Command kinds carried in a request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Get = 0x01,
    Set = 0x02,
    Delete = 0x03,
    Ping = 0x04,
}

impl TryFrom<u8> for Command {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(Command::Get),
            0x02 => Ok(Command::Set),
            0x03 => Ok(Command::Delete),
            0x04 => Ok(Command::Ping),
            _ => Err(()),
        }
    }
}

/// Status codes carried in a response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    KeyNotFound = 0x01,
    InvalidCommand = 0x02,
    ProtocolError = 0x03,
    InternalError = 0x04,
}

/// A decoded and validated request header. Key/value bytes follow on the
/// wire and are read separately by the connection pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub command: Command,
    pub key_length: u32,
    pub value_length: u32,
    pub sequence_id: u16,
}

/// Decode and validate a 16-byte request header.
///
/// Validation, per the wire spec:
/// - magic must equal [`REQUEST_MAGIC`]
/// - command must be one of GET/SET/DELETE/PING
/// - key_length must be > 0 for GET/SET/DELETE, and 0 for PING, and ≤ [`MAX_KEY_LEN`]
/// - value_length must be 0 for GET/DELETE/PING, and any value for SET
///
/// On any violation this returns `Err` without the caller having read a
/// single byte of the request body (the body isn't read until the header
/// has already validated).
pub fn decode_request_header(bytes: &[u8; HEADER_SIZE]) -> Result<RequestHeader, KvError> {
    let magic = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    if magic != REQUEST_MAGIC {
        return Err(KvError::Protocol(format!("bad magic: {magic:#x}")));
    }

    let command = Command::try_from(bytes[4])
        .map_err(|_| KvError::InvalidCommand(format!("unknown command byte: {:#x}", bytes[4])))?;

    // bytes[5] is the reserved flags byte; always 0, never validated since
    // a future flag bit must not break old clients.

    let key_length = u32::from_be_bytes(bytes[6..10].try_into().unwrap());
    let value_length = u32::from_be_bytes(bytes[10..14].try_into().unwrap());
    let sequence_id = u16::from_be_bytes(bytes[14..16].try_into().unwrap());

    if key_length > MAX_KEY_LEN {
        return Err(KvError::InvalidCommand(format!(
            "key_length {key_length} exceeds maximum {MAX_KEY_LEN}"
        )));
    }

    match command {
        Command::Get | Command::Set | Command::Delete => {
            if key_length == 0 {
                return Err(KvError::InvalidCommand(
                    "key_length must be > 0 for GET/SET/DELETE".into(),
                ));
            }
        }
        Command::Ping => {
            if key_length != 0 {
                return Err(KvError::InvalidCommand(
                    "key_length must be 0 for PING".into(),
                ));
            }
        }
    }

    match command {
        Command::Get | Command::Delete | Command::Ping => {
            if value_length != 0 {
                return Err(KvError::InvalidCommand(
                    "value_length must be 0 for GET/DELETE/PING".into(),
                ));
            }
        }
        Command::Set => {}
    }

    Ok(RequestHeader {
        command,
        key_length,
        value_length,
        sequence_id,
    })
}

/// Encode the 16-byte request header. Used by clients and by tests driving
/// the server over a real TCP connection.
pub fn encode_request_header(header: &RequestHeader) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(&REQUEST_MAGIC.to_be_bytes());
    buf[4] = header.command as u8;
    buf[5] = 0;
    buf[6..10].copy_from_slice(&header.key_length.to_be_bytes());
    buf[10..14].copy_from_slice(&header.value_length.to_be_bytes());
    buf[14..16].copy_from_slice(&header.sequence_id.to_be_bytes());
    buf
}

/// Encode a 16-byte response header followed by `payload`. `payload` should
/// be empty for every status except `Ok` responses that carry data (GET).
pub fn encode_response(sequence_id: u16, status: Status, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&RESPONSE_MAGIC.to_be_bytes());
    buf.push(status as u8);
    buf.push(0); // reserved flags
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes()); // reserved gap, kept for wire compatibility
    buf.extend_from_slice(&sequence_id.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// A decoded response header, used by the test harness to parse server replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: Status,
    pub data_length: u32,
    pub sequence_id: u16,
}

impl TryFrom<u8> for Status {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Status::Ok),
            0x01 => Ok(Status::KeyNotFound),
            0x02 => Ok(Status::InvalidCommand),
            0x03 => Ok(Status::ProtocolError),
            0x04 => Ok(Status::InternalError),
            _ => Err(()),
        }
    }
}

/// Decode a 16-byte response header. Used by the test harness only; the
/// server never parses its own responses.
pub fn decode_response_header(bytes: &[u8; HEADER_SIZE]) -> Result<ResponseHeader, KvError> {
    let magic = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    if magic != RESPONSE_MAGIC {
        return Err(KvError::Protocol(format!("bad response magic: {magic:#x}")));
    }
    let status = Status::try_from(bytes[4])
        .map_err(|_| KvError::Protocol(format!("unknown status byte: {:#x}", bytes[4])))?;
    let data_length = u32::from_be_bytes(bytes[6..10].try_into().unwrap());
    let sequence_id = u16::from_be_bytes(bytes[14..16].try_into().unwrap());
    Ok(ResponseHeader {
        status,
        data_length,
        sequence_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_bytes(command: u8, key_length: u32, value_length: u32, seq: u16) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&REQUEST_MAGIC.to_be_bytes());
        buf[4] = command;
        buf[6..10].copy_from_slice(&key_length.to_be_bytes());
        buf[10..14].copy_from_slice(&value_length.to_be_bytes());
        buf[14..16].copy_from_slice(&seq.to_be_bytes());
        buf
    }

    #[test]
    fn test_decode_valid_get() {
        let bytes = request_bytes(0x01, 3, 0, 0x0011);
        let header = decode_request_header(&bytes).unwrap();
        assert_eq!(header.command, Command::Get);
        assert_eq!(header.key_length, 3);
        assert_eq!(header.value_length, 0);
        assert_eq!(header.sequence_id, 0x0011);
    }

    #[test]
    fn test_decode_valid_ping_zero_lengths() {
        let bytes = request_bytes(0x04, 0, 0, 1);
        let header = decode_request_header(&bytes).unwrap();
        assert_eq!(header.command, Command::Ping);
    }

    #[test]
    fn test_decode_bad_magic() {
        let mut bytes = request_bytes(0x01, 3, 0, 0);
        bytes[0] = 0x00;
        assert!(decode_request_header(&bytes).is_err());
    }

    #[test]
    fn test_decode_unknown_command() {
        let bytes = request_bytes(0xFF, 3, 0, 0);
        assert!(decode_request_header(&bytes).is_err());
    }

    #[test]
    fn test_decode_get_requires_key() {
        let bytes = request_bytes(0x01, 0, 0, 0);
        assert!(decode_request_header(&bytes).is_err());
    }

    #[test]
    fn test_decode_ping_rejects_key() {
        let bytes = request_bytes(0x04, 1, 0, 0);
        assert!(decode_request_header(&bytes).is_err());
    }

    #[test]
    fn test_decode_get_rejects_value() {
        let bytes = request_bytes(0x01, 3, 1, 0);
        assert!(decode_request_header(&bytes).is_err());
    }

    #[test]
    fn test_decode_set_allows_value() {
        let bytes = request_bytes(0x02, 3, 10, 0);
        assert!(decode_request_header(&bytes).is_ok());
    }

    #[test]
    fn test_decode_rejects_oversized_key() {
        let bytes = request_bytes(0x01, MAX_KEY_LEN + 1, 0, 0);
        assert!(decode_request_header(&bytes).is_err());
    }

    #[test]
    fn test_round_trip_request_header() {
        let header = RequestHeader {
            command: Command::Set,
            key_length: 3,
            value_length: 3,
            sequence_id: 0x0010,
        };
        let bytes = encode_request_header(&header);
        let decoded = decode_request_header(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_encode_decode_response_header() {
        let encoded = encode_response(0x0011, Status::Ok, b"bar");
        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&encoded[..HEADER_SIZE]);
        let decoded = decode_response_header(&header_bytes).unwrap();
        assert_eq!(decoded.status, Status::Ok);
        assert_eq!(decoded.data_length, 3);
        assert_eq!(decoded.sequence_id, 0x0011);
        assert_eq!(&encoded[HEADER_SIZE..], b"bar");
    }

    #[test]
    fn test_encode_response_no_payload() {
        let encoded = encode_response(7, Status::KeyNotFound, &[]);
        assert_eq!(encoded.len(), HEADER_SIZE);
    }
}
