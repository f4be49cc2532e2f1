//! Connection handshake frame.
//!
//! The handshake is exchanged once at connection setup, outside the tag-based
//! dispatch used for parcels and chunks. It is a fixed 36-byte frame of which
//! only the first 8 bytes carry data:
//!
//! ```text
//! +---------+--------+----------+---------+------------------+
//! | u16 ver | u8 sts | u8 rsvd  | u32 tok | 28 bytes zero    |
//! +---------+--------+----------+---------+------------------+
//! ```

use crate::registry::{HandshakeStatus, HANDSHAKE_DATA_SIZE, HANDSHAKE_SIZE, PROTOCOL_VERSION};
use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Decoded handshake record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version of the sender
    pub version: u16,
    /// New or restored session
    pub status: HandshakeStatus,
    /// Opaque byte carried through unchanged
    pub reserved: u8,
    /// Session token (0 for a new session)
    pub token: u32,
}

impl Handshake {
    /// Create a handshake for the current protocol version
    pub fn new(status: HandshakeStatus, reserved: u8, token: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            status,
            reserved,
            token,
        }
    }

    /// Handshake opening a new session
    pub fn new_session() -> Self {
        Self::new(HandshakeStatus::New, 0, 0)
    }

    /// Handshake restoring the session identified by `token`
    pub fn restore(token: u32) -> Self {
        Self::new(HandshakeStatus::Restore, 0, token)
    }

    /// Encode to a 36-byte frame.
    ///
    /// The version field is always written as [`PROTOCOL_VERSION`], whatever
    /// `self.version` holds.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_SIZE);
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Append the 36-byte frame to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u16_le(PROTOCOL_VERSION);
        buf.put_u8(self.status as u8);
        buf.put_u8(self.reserved);
        buf.put_u32_le(self.token);
        buf.put_bytes(0, HANDSHAKE_SIZE - HANDSHAKE_DATA_SIZE);
    }

    /// Decode from the first 8 bytes of `buf`; padding is not inspected
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HANDSHAKE_DATA_SIZE {
            return Err(WireError::MalformedFrame("short handshake"));
        }

        let mut cur = &buf[..HANDSHAKE_DATA_SIZE];
        let version = cur.get_u16_le();
        let status = HandshakeStatus::try_from(cur.get_u8())?;
        let reserved = cur.get_u8();
        let token = cur.get_u32_le();

        Ok(Self {
            version,
            status,
            reserved,
            token,
        })
    }

    /// Reject handshakes from a different protocol version
    pub fn validate(&self) -> Result<(), WireError> {
        if self.version != PROTOCOL_VERSION {
            return Err(WireError::Version(self.version));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_layout() {
        let bytes = Handshake::new(HandshakeStatus::Restore, 7, 0xDEADBEEF).encode();

        assert_eq!(bytes.len(), HANDSHAKE_SIZE);
        assert_eq!(&bytes[..8], &[0x01, 0x00, 0x01, 0x07, 0xEF, 0xBE, 0xAD, 0xDE]);
        assert!(bytes[8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_handshake_encode_decode() {
        let hs = Handshake::restore(42);
        let decoded = Handshake::decode(&hs.encode()).unwrap();

        assert_eq!(decoded, hs);
        assert!(decoded.validate().is_ok());
    }

    #[test]
    fn test_encode_ignores_stale_version() {
        let mut hs = Handshake::new_session();
        hs.version = 9;

        let decoded = Handshake::decode(&hs.encode()).unwrap();
        assert_eq!(decoded.version, PROTOCOL_VERSION);
    }

    #[test]
    fn test_decode_reads_only_data_bytes() {
        let mut raw = Handshake::new_session().encode().to_vec();
        raw[20] = 0xFF;
        assert_eq!(
            Handshake::decode(&raw).unwrap(),
            Handshake::new_session()
        );

        // Eight bytes are enough, padding may be missing entirely
        assert!(Handshake::decode(&raw[..8]).is_ok());
    }

    #[test]
    fn test_decode_short_buffer() {
        assert_eq!(
            Handshake::decode(&[1, 0, 0, 0, 0, 0, 0]),
            Err(WireError::MalformedFrame("short handshake"))
        );
    }

    #[test]
    fn test_decode_unknown_status() {
        let raw = [1u8, 0, 2, 0, 0, 0, 0, 0];
        assert_eq!(
            Handshake::decode(&raw),
            Err(WireError::MalformedFrame("handshake status"))
        );
    }

    #[test]
    fn test_validate_version() {
        let raw = [2u8, 0, 0, 0, 0, 0, 0, 0];
        let hs = Handshake::decode(&raw).unwrap();
        assert_eq!(hs.validate(), Err(WireError::Version(2)));
    }
}
