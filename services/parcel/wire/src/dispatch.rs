//! Tag-based dispatch of incoming parcel and chunk buffers.
//!
//! Byte 0 of every parcel or chunk buffer carries its [`StructType`]. The
//! handshake has no tag and never goes through here.

use crate::chunk::{peek_payload_length, Chunk};
use crate::parcel::Parcel;
use crate::registry::{StructType, CHUNK_HEADER_SIZE, MAX_CHUNK_PAYLOAD, PARCEL_HEADER_SIZE};
use crate::WireError;
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};

/// A decoded parcel or chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "struct", rename_all = "lowercase")]
pub enum WireStruct {
    /// Parcel header
    Parcel(Parcel),
    /// Chunk with payload
    Chunk(Chunk),
}

impl WireStruct {
    /// Struct-type tag of the record
    pub fn struct_type(&self) -> StructType {
        match self {
            WireStruct::Parcel(_) => StructType::Parcel,
            WireStruct::Chunk(_) => StructType::Chunk,
        }
    }

    /// Parcel id the record belongs to
    pub fn parcel_id(&self) -> u32 {
        match self {
            WireStruct::Parcel(p) => p.parcel_id,
            WireStruct::Chunk(c) => c.parcel_id,
        }
    }
}

impl From<Parcel> for WireStruct {
    fn from(parcel: Parcel) -> Self {
        WireStruct::Parcel(parcel)
    }
}

impl From<Chunk> for WireStruct {
    fn from(chunk: Chunk) -> Self {
        WireStruct::Chunk(chunk)
    }
}

/// Read the raw struct-type tag at byte 0
pub fn read_struct_type(buf: &[u8]) -> Result<u8, WireError> {
    buf.first().copied().ok_or(WireError::OutOfBounds {
        needed: 1,
        available: 0,
    })
}

/// Decode a parcel or chunk according to its leading tag
pub fn read_struct(buf: &[u8], end: usize) -> Result<WireStruct, WireError> {
    match StructType::try_from(read_struct_type(buf)?)? {
        StructType::Parcel => Parcel::decode(buf, end).map(WireStruct::Parcel),
        StructType::Chunk => Chunk::decode(buf, end).map(WireStruct::Chunk),
    }
}

/// Incremental decoder for a byte stream of parcels and chunks
#[derive(Debug)]
pub struct StructDecoder {
    max_chunk_payload: usize,
}

impl StructDecoder {
    /// Create a decoder accepting chunks up to the wire maximum
    pub fn new() -> Self {
        Self {
            max_chunk_payload: MAX_CHUNK_PAYLOAD,
        }
    }

    /// Create a decoder that rejects chunks larger than `max_chunk_payload`
    pub fn with_max_chunk_payload(max_chunk_payload: usize) -> Self {
        Self {
            max_chunk_payload: max_chunk_payload.min(MAX_CHUNK_PAYLOAD),
        }
    }

    /// Decode one record from the front of `buf`.
    ///
    /// Returns `Ok(None)` until a whole record is buffered. Consumed bytes
    /// are removed from `buf`; on error nothing is consumed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<WireStruct>, WireError> {
        if buf.is_empty() {
            return Ok(None);
        }

        let record_len = match StructType::try_from(buf[0])? {
            StructType::Parcel => PARCEL_HEADER_SIZE,
            StructType::Chunk => {
                if buf.len() < CHUNK_HEADER_SIZE {
                    return Ok(None);
                }
                let payload_len = peek_payload_length(&buf[..])? as usize;
                if payload_len > self.max_chunk_payload {
                    return Err(WireError::LengthOverflow(payload_len as u64));
                }
                CHUNK_HEADER_SIZE + payload_len
            }
        };

        if buf.len() < record_len {
            return Ok(None);
        }

        let record = read_struct(&buf[..record_len], record_len)?;
        buf.advance(record_len);
        Ok(Some(record))
    }

    /// Decode every complete record in `buf`, leaving any partial tail
    pub fn decode_all(&mut self, buf: &mut BytesMut) -> Result<Vec<WireStruct>, WireError> {
        let mut records = Vec::new();
        while let Some(record) = self.decode(buf)? {
            records.push(record);
        }
        Ok(records)
    }
}

impl Default for StructDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ChunkFlags, ParcelType};
    use bytes::{BufMut, Bytes};

    fn parcel_bytes() -> Bytes {
        Parcel::new(11, ParcelType::Call, 5).encode().unwrap()
    }

    fn chunk_bytes() -> Bytes {
        Chunk::new(11, 1, ChunkFlags::STOP, Bytes::from_static(b"hello"))
            .unwrap()
            .encode()
            .unwrap()
    }

    #[test]
    fn test_read_struct_type() {
        assert_eq!(read_struct_type(&parcel_bytes()).unwrap(), 0);
        assert_eq!(read_struct_type(&chunk_bytes()).unwrap(), 1);
        assert!(read_struct_type(&[]).is_err());
    }

    #[test]
    fn test_read_struct_routes_by_tag() {
        let parcel = parcel_bytes();
        match read_struct(&parcel, parcel.len()).unwrap() {
            WireStruct::Parcel(p) => assert_eq!(p.length, 5),
            other => panic!("expected parcel, got {:?}", other),
        }

        let chunk = chunk_bytes();
        let record = read_struct(&chunk, chunk.len()).unwrap();
        assert_eq!(record.struct_type(), StructType::Chunk);
        assert_eq!(record.parcel_id(), 11);
    }

    #[test]
    fn test_read_struct_unknown_tag() {
        let mut raw = parcel_bytes().to_vec();
        raw[0] = 9;
        assert_eq!(
            read_struct(&raw, raw.len()),
            Err(WireError::UnknownStructType(9))
        );
    }

    #[test]
    fn test_decoder_waits_for_complete_records() {
        let mut stream = BytesMut::new();
        stream.put_slice(&parcel_bytes());
        stream.put_slice(&chunk_bytes());
        let full = stream.clone();

        let mut decoder = StructDecoder::new();
        let mut buf = BytesMut::new();
        let mut records = Vec::new();
        for byte in full.iter() {
            buf.put_u8(*byte);
            if let Some(record) = decoder.decode(&mut buf).unwrap() {
                records.push(record);
            }
        }

        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], WireStruct::Parcel(_)));
        assert!(matches!(&records[1], WireStruct::Chunk(c) if c.payload == "hello"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_all_leaves_partial_tail() {
        let mut buf = BytesMut::new();
        buf.put_slice(&parcel_bytes());
        buf.put_slice(&chunk_bytes()[..14]);

        let records = StructDecoder::default().decode_all(&mut buf).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(buf.len(), 14);
    }

    #[test]
    fn test_decoder_rejects_unknown_tag_without_consuming() {
        let mut buf = BytesMut::from(&[7u8, 0, 0][..]);
        assert_eq!(
            StructDecoder::new().decode(&mut buf),
            Err(WireError::UnknownStructType(7))
        );
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decoder_payload_limit() {
        let mut buf = BytesMut::from(&chunk_bytes()[..]);
        assert_eq!(
            StructDecoder::with_max_chunk_payload(4).decode(&mut buf),
            Err(WireError::LengthOverflow(5))
        );
    }

    #[test]
    fn test_struct_serializes_with_tag() {
        let parcel = Parcel::new(1, ParcelType::Ping, 0);
        let json = serde_json::to_value(WireStruct::from(parcel)).unwrap();
        assert_eq!(json["struct"], "parcel");
        assert_eq!(json["parcel_id"], 1);
    }
}
