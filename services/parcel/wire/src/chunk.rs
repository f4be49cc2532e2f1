//! Chunk codec: one payload fragment of a parcel body.
//!
//! ```text
//! +--------+------------+-----------+----------+---------+-------------+
//! | u8 tag | u32 parcel | u32 chunk | u8 flags | u16 len | len bytes   |
//! +--------+------------+-----------+----------+---------+-------------+
//! ```

use crate::registry::{ChunkFlags, StructType, CHUNK_HEADER_SIZE};
use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Offset of the u16 payload length
const LENGTH_OFFSET: usize = 10;

/// Chunk record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning parcel
    pub parcel_id: u32,
    /// 1-based sequence number within the parcel
    pub chunk_id: u32,
    /// Flow-control flags
    pub flags: ChunkFlags,
    /// Declared payload length
    pub length: u16,
    /// Fragment bytes
    pub payload: Bytes,
}

impl Chunk {
    /// Struct-type tag carried at byte 0
    pub const STRUCT_TYPE: StructType = StructType::Chunk;

    /// Create a chunk whose declared length matches `payload`
    pub fn new(
        parcel_id: u32,
        chunk_id: u32,
        flags: ChunkFlags,
        payload: Bytes,
    ) -> Result<Self, WireError> {
        let length = u16::try_from(payload.len())
            .map_err(|_| WireError::LengthOverflow(payload.len() as u64))?;
        Ok(Self {
            parcel_id,
            chunk_id,
            flags,
            length,
            payload,
        })
    }

    /// Struct-type tag of this record
    pub fn struct_type(&self) -> StructType {
        Self::STRUCT_TYPE
    }

    /// Size of the encoded chunk, header included
    pub fn encoded_len(&self) -> usize {
        CHUNK_HEADER_SIZE + self.length as usize
    }

    /// Encode header and payload
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append header and payload to `buf`.
    ///
    /// Fails without writing if the declared length disagrees with the payload.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        if self.payload.len() != self.length as usize {
            return Err(WireError::LengthMismatch {
                declared: self.length as usize,
                actual: self.payload.len(),
            });
        }

        buf.reserve(self.encoded_len());
        buf.put_u8(Self::STRUCT_TYPE as u8);
        buf.put_u32_le(self.parcel_id);
        buf.put_u32_le(self.chunk_id);
        buf.put_u8(self.flags.bits());
        buf.put_u16_le(self.length);
        buf.put_slice(&self.payload);
        Ok(())
    }

    /// Decode a chunk.
    ///
    /// `end` is the number of valid bytes in `buf`. The payload is read using
    /// the declared length; if fewer bytes are available the chunk is
    /// rejected with [`WireError::TruncatedPayload`]. Bytes past the payload
    /// are ignored.
    pub fn decode(buf: &[u8], end: usize) -> Result<Self, WireError> {
        let available = end.min(buf.len());
        if available < CHUNK_HEADER_SIZE {
            return Err(WireError::OutOfBounds {
                needed: CHUNK_HEADER_SIZE,
                available,
            });
        }

        let mut cur = &buf[..CHUNK_HEADER_SIZE];
        if cur.get_u8() != Self::STRUCT_TYPE as u8 {
            return Err(WireError::MalformedFrame("chunk tag"));
        }
        let parcel_id = cur.get_u32_le();
        let chunk_id = cur.get_u32_le();
        let flags = ChunkFlags::from_bits_retain(cur.get_u8());
        let length = cur.get_u16_le();

        let body = available - CHUNK_HEADER_SIZE;
        if body < length as usize {
            return Err(WireError::TruncatedPayload {
                declared: length as usize,
                available: body,
            });
        }
        let payload =
            Bytes::copy_from_slice(&buf[CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + length as usize]);

        Ok(Self {
            parcel_id,
            chunk_id,
            flags,
            length,
            payload,
        })
    }
}

/// Read the payload length of a chunk without decoding it.
///
/// Stream readers use this to learn how many bytes to buffer before a full
/// [`Chunk::decode`] can succeed.
pub fn peek_payload_length(buf: &[u8]) -> Result<u16, WireError> {
    if buf.len() < CHUNK_HEADER_SIZE {
        return Err(WireError::OutOfBounds {
            needed: CHUNK_HEADER_SIZE,
            available: buf.len(),
        });
    }
    Ok(u16::from_le_bytes([buf[LENGTH_OFFSET], buf[LENGTH_OFFSET + 1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Chunk {
        Chunk::new(
            0x01020304,
            2,
            ChunkFlags::MORE | ChunkFlags::RESUME,
            Bytes::from_static(b"abc"),
        )
        .unwrap()
    }

    #[test]
    fn test_chunk_layout() {
        let bytes = sample().encode().unwrap();
        assert_eq!(hex::encode(&bytes), "010403020102000000090300616263");
    }

    #[test]
    fn test_chunk_encode_decode() {
        let chunk = sample();
        let bytes = chunk.encode().unwrap();

        assert_eq!(bytes.len(), CHUNK_HEADER_SIZE + 3);
        let decoded = Chunk::decode(&bytes, bytes.len()).unwrap();
        assert_eq!(decoded, chunk);
        assert_eq!(decoded.struct_type(), StructType::Chunk);
    }

    #[test]
    fn test_length_mismatch() {
        let chunk = Chunk {
            parcel_id: 1,
            chunk_id: 1,
            flags: ChunkFlags::STOP,
            length: 5,
            payload: Bytes::from_static(b"four"),
        };
        assert_eq!(
            chunk.encode(),
            Err(WireError::LengthMismatch {
                declared: 5,
                actual: 4
            })
        );
    }

    #[test]
    fn test_new_rejects_oversized_payload() {
        let payload = Bytes::from(vec![0u8; u16::MAX as usize + 1]);
        assert_eq!(
            Chunk::new(1, 1, ChunkFlags::empty(), payload),
            Err(WireError::LengthOverflow(65536))
        );
    }

    #[test]
    fn test_decode_truncated_payload() {
        let bytes = sample().encode().unwrap();

        assert_eq!(
            Chunk::decode(&bytes[..13], 13),
            Err(WireError::TruncatedPayload {
                declared: 3,
                available: 1
            })
        );
        // `end` bounds the buffer even when more bytes are present
        assert!(Chunk::decode(&bytes, 14).is_err());
    }

    #[test]
    fn test_decode_short_header() {
        assert_eq!(
            Chunk::decode(&[1, 0, 0], 3),
            Err(WireError::OutOfBounds {
                needed: 12,
                available: 3
            })
        );
    }

    #[test]
    fn test_decode_ignores_following_bytes() {
        let mut buf = BytesMut::new();
        sample().encode_into(&mut buf).unwrap();
        buf.put_slice(&[0xAA; 8]);

        let decoded = Chunk::decode(&buf, buf.len()).unwrap();
        assert_eq!(decoded.payload, Bytes::from_static(b"abc"));
    }

    #[test]
    fn test_unknown_flag_bits_survive() {
        let mut raw = sample().encode().unwrap().to_vec();
        raw[9] = 0xF1;

        let decoded = Chunk::decode(&raw, raw.len()).unwrap();
        assert_eq!(decoded.flags.bits(), 0xF1);
        assert!(decoded.flags.contains(ChunkFlags::MORE));
    }

    #[test]
    fn test_peek_payload_length() {
        let bytes = sample().encode().unwrap();
        assert_eq!(peek_payload_length(&bytes).unwrap(), 3);
        assert_eq!(peek_payload_length(&bytes[..12]).unwrap(), 3);
        assert!(peek_payload_length(&bytes[..11]).is_err());
    }
}
