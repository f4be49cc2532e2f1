//! Parcel header: the envelope of one logical message.
//!
//! ```text
//! +--------+-------------+---------+--------+--------+--------------------+
//! | u8 tag | u32 parcel  | u8 type | u8 cmp | u8 enc | 8 ASCII digits len |
//! +--------+-------------+---------+--------+--------+--------------------+
//! ```
//!
//! The length is the total byte length of the body that follows in chunks,
//! written as a zero-padded decimal string.

use crate::registry::{
    Compression, Encoding, ParcelType, StructType, MAX_PARCEL_LENGTH, PARCEL_HEADER_SIZE,
    PARCEL_LENGTH_DIGITS,
};
use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Offset of the decimal length field
const LENGTH_OFFSET: usize = PARCEL_HEADER_SIZE - PARCEL_LENGTH_DIGITS;

/// Parcel header record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    /// Message id, scoped to the connection
    pub parcel_id: u32,
    /// Kind of message
    pub parcel_type: ParcelType,
    /// Body compression
    pub compression: Compression,
    /// Body serialization format
    pub encoding: Encoding,
    /// Total body length in bytes
    pub length: u64,
}

impl Parcel {
    /// Struct-type tag carried at byte 0
    pub const STRUCT_TYPE: StructType = StructType::Parcel;

    /// Create an uncompressed binary parcel header
    pub fn new(parcel_id: u32, parcel_type: ParcelType, length: u64) -> Self {
        Self {
            parcel_id,
            parcel_type,
            compression: Compression::None,
            encoding: Encoding::Binary,
            length,
        }
    }

    /// Struct-type tag of this record
    pub fn struct_type(&self) -> StructType {
        Self::STRUCT_TYPE
    }

    /// Encode to a 16-byte header
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let mut buf = BytesMut::with_capacity(PARCEL_HEADER_SIZE);
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append the 16-byte header to `buf`.
    ///
    /// Nothing is written when the length does not fit in eight digits.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        if self.length > MAX_PARCEL_LENGTH {
            return Err(WireError::LengthOverflow(self.length));
        }

        buf.reserve(PARCEL_HEADER_SIZE);
        buf.put_u8(Self::STRUCT_TYPE as u8);
        buf.put_u32_le(self.parcel_id);
        buf.put_u8(self.parcel_type as u8);
        buf.put_u8(self.compression as u8);
        buf.put_u8(self.encoding as u8);
        let digits = format!("{:0width$}", self.length, width = PARCEL_LENGTH_DIGITS);
        buf.put_slice(digits.as_bytes());
        Ok(())
    }

    /// Decode a parcel header.
    ///
    /// `end` is the number of valid bytes in `buf`. The full 16-byte header
    /// must be available; a partially received length field is reported as
    /// [`WireError::OutOfBounds`] rather than parsed from fewer digits.
    pub fn decode(buf: &[u8], end: usize) -> Result<Self, WireError> {
        let available = end.min(buf.len());
        if available < LENGTH_OFFSET {
            return Err(WireError::OutOfBounds {
                needed: LENGTH_OFFSET,
                available,
            });
        }

        let mut cur = &buf[..LENGTH_OFFSET];
        if cur.get_u8() != Self::STRUCT_TYPE as u8 {
            return Err(WireError::MalformedFrame("parcel tag"));
        }
        let parcel_id = cur.get_u32_le();
        let parcel_type = ParcelType::try_from(cur.get_u8())?;
        let compression = Compression::try_from(cur.get_u8())?;
        let encoding = Encoding::try_from(cur.get_u8())?;

        if available < PARCEL_HEADER_SIZE {
            return Err(WireError::OutOfBounds {
                needed: PARCEL_HEADER_SIZE,
                available,
            });
        }
        let length = parse_length(&buf[LENGTH_OFFSET..PARCEL_HEADER_SIZE])?;

        Ok(Self {
            parcel_id,
            parcel_type,
            compression,
            encoding,
            length,
        })
    }
}

/// Parse the fixed-width decimal length field
fn parse_length(field: &[u8]) -> Result<u64, WireError> {
    if !field.iter().all(u8::is_ascii_digit) {
        return Err(WireError::MalformedFrame("parcel length"));
    }
    Ok(field
        .iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_field_is_padded() {
        let bytes = Parcel::new(1, ParcelType::Event, 42).encode().unwrap();
        assert_eq!(bytes.len(), PARCEL_HEADER_SIZE);
        assert_eq!(&bytes[8..], b"00000042");
    }

    #[test]
    fn test_parcel_layout() {
        let parcel = Parcel {
            parcel_id: 7,
            parcel_type: ParcelType::Call,
            compression: Compression::None,
            encoding: Encoding::Json,
            length: 123,
        };

        let bytes = parcel.encode().unwrap();
        assert_eq!(
            hex::encode(&bytes),
            format!("00{}{}{}{}{}", "07000000", "02", "00", "02", hex::encode("00000123"))
        );
    }

    #[test]
    fn test_parcel_encode_decode() {
        let parcel = Parcel {
            parcel_id: 0xA1B2C3D4,
            parcel_type: ParcelType::Stream,
            compression: Compression::Gzip,
            encoding: Encoding::Bson,
            length: MAX_PARCEL_LENGTH,
        };

        let bytes = parcel.encode().unwrap();
        let decoded = Parcel::decode(&bytes, bytes.len()).unwrap();
        assert_eq!(decoded, parcel);
        assert_eq!(decoded.struct_type(), StructType::Parcel);
    }

    #[test]
    fn test_length_overflow() {
        let parcel = Parcel::new(1, ParcelType::Call, MAX_PARCEL_LENGTH + 1);
        assert_eq!(
            parcel.encode(),
            Err(WireError::LengthOverflow(100_000_000))
        );

        let mut buf = BytesMut::new();
        assert!(parcel.encode_into(&mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut buf = BytesMut::new();
        Parcel::new(3, ParcelType::Ping, 0).encode_into(&mut buf).unwrap();
        buf.put_slice(b"\x01trailing");

        let decoded = Parcel::decode(&buf, buf.len()).unwrap();
        assert_eq!(decoded.length, 0);
    }

    #[test]
    fn test_decode_partial_length_field() {
        let bytes = Parcel::new(3, ParcelType::Ping, 5).encode().unwrap();

        assert_eq!(
            Parcel::decode(&bytes, 12),
            Err(WireError::OutOfBounds {
                needed: 16,
                available: 12
            })
        );
        assert_eq!(
            Parcel::decode(&bytes[..4], 16),
            Err(WireError::OutOfBounds {
                needed: 8,
                available: 4
            })
        );
    }

    #[test]
    fn test_decode_non_digit_length() {
        let mut raw = Parcel::new(3, ParcelType::Ping, 5).encode().unwrap().to_vec();
        raw[10] = b'x';
        assert_eq!(
            Parcel::decode(&raw, raw.len()),
            Err(WireError::MalformedFrame("parcel length"))
        );

        raw[10] = b' ';
        assert!(Parcel::decode(&raw, raw.len()).is_err());
    }

    #[test]
    fn test_decode_bad_fields() {
        let raw = Parcel::new(3, ParcelType::Ping, 5).encode().unwrap().to_vec();

        let mut bad_tag = raw.clone();
        bad_tag[0] = 1;
        assert_eq!(
            Parcel::decode(&bad_tag, 16),
            Err(WireError::MalformedFrame("parcel tag"))
        );

        let mut bad_type = raw.clone();
        bad_type[5] = 6;
        assert_eq!(
            Parcel::decode(&bad_type, 16),
            Err(WireError::MalformedFrame("parcel type"))
        );

        let mut bad_compression = raw.clone();
        bad_compression[6] = 2;
        assert_eq!(
            Parcel::decode(&bad_compression, 16),
            Err(WireError::MalformedFrame("compression"))
        );

        let mut bad_encoding = raw;
        bad_encoding[7] = 5;
        assert_eq!(
            Parcel::decode(&bad_encoding, 16),
            Err(WireError::MalformedFrame("encoding"))
        );
    }
}
