//! Whole-message encoding.
//!
//! [`ParcelBuilder`] turns one message body into its parcel header followed
//! by the chunks carrying the body. Non-final chunks are flagged
//! [`ChunkFlags::MORE`], the final one [`ChunkFlags::STOP`].

use crate::chunker::Chunker;
use crate::parcel::Parcel;
use crate::registry::{ChunkFlags, Compression, Encoding, ParcelType};
use crate::WireError;
use bytes::{Bytes, BytesMut};

/// Encoded parcel header and chunk buffers for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedParcel {
    /// 16-byte parcel header
    pub header: Bytes,
    /// Encoded chunks in chunk-id order
    pub chunks: Vec<Bytes>,
}

impl EncodedParcel {
    /// Total encoded size
    pub fn len(&self) -> usize {
        self.header.len() + self.chunks.iter().map(Bytes::len).sum::<usize>()
    }

    /// Always false: the header is never empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate header and chunks into one contiguous buffer
    pub fn concat(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.extend_from_slice(&self.header);
        for chunk in &self.chunks {
            buf.extend_from_slice(chunk);
        }
        buf.freeze()
    }
}

/// Builder for encoding one message
#[derive(Debug, Clone)]
pub struct ParcelBuilder {
    parcel_id: u32,
    parcel_type: ParcelType,
    compression: Compression,
    encoding: Encoding,
    chunker: Chunker,
    payload: Bytes,
}

impl ParcelBuilder {
    /// Create a builder for a binary, uncompressed message
    pub fn new(parcel_id: u32, parcel_type: ParcelType) -> Self {
        Self {
            parcel_id,
            parcel_type,
            compression: Compression::None,
            encoding: Encoding::Binary,
            chunker: Chunker::new(),
            payload: Bytes::new(),
        }
    }

    /// Declare the body compression. The body is not compressed here.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Declare the body encoding
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Use a custom chunker
    pub fn chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set the maximum fragment size
    pub fn fragment_size(mut self, fragment_size: usize) -> Result<Self, WireError> {
        self.chunker = Chunker::with_fragment_size(fragment_size)?;
        Ok(self)
    }

    /// Set the message body
    pub fn payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }

    /// Parcel header this builder will emit
    pub fn header(&self) -> Parcel {
        Parcel {
            parcel_id: self.parcel_id,
            parcel_type: self.parcel_type,
            compression: self.compression,
            encoding: self.encoding,
            length: self.payload.len() as u64,
        }
    }

    /// Encode the header and all chunks
    pub fn build(self) -> Result<EncodedParcel, WireError> {
        let header = self.header().encode()?;
        let parcel_id = self.parcel_id;

        let fragments = self.chunker.split(self.payload)?;
        let last = fragments.len() - 1;
        let chunks = fragments
            .into_iter()
            .enumerate()
            .map(|(i, fragment)| {
                let flags = if i == last {
                    ChunkFlags::STOP
                } else {
                    ChunkFlags::MORE
                };
                fragment.into_chunk(parcel_id, flags).encode()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EncodedParcel { header, chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::chunker::Reassembler;
    use crate::dispatch::{StructDecoder, WireStruct};
    use crate::registry::{MAX_PARCEL_LENGTH, PARCEL_HEADER_SIZE};

    #[test]
    fn test_builder_flags_chunks() {
        let encoded = ParcelBuilder::new(3, ParcelType::Call)
            .encoding(Encoding::Json)
            .fragment_size(4)
            .unwrap()
            .payload(Bytes::from_static(b"{\"a\":1}"))
            .build()
            .unwrap();

        assert_eq!(&encoded.header[8..], b"00000007");
        assert_eq!(encoded.chunks.len(), 2);

        let first = Chunk::decode(&encoded.chunks[0], encoded.chunks[0].len()).unwrap();
        let second = Chunk::decode(&encoded.chunks[1], encoded.chunks[1].len()).unwrap();
        assert_eq!((first.chunk_id, first.flags), (1, ChunkFlags::MORE));
        assert_eq!((second.chunk_id, second.flags), (2, ChunkFlags::STOP));
    }

    #[test]
    fn test_builder_empty_body() {
        let encoded = ParcelBuilder::new(1, ParcelType::Ping).build().unwrap();
        assert_eq!(encoded.chunks.len(), 1);
        assert_eq!(encoded.len(), PARCEL_HEADER_SIZE + 12);
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_builder_stream_roundtrip() {
        let body = Bytes::from((0..10_000u32).map(|i| i as u8).collect::<Vec<_>>());
        let encoded = ParcelBuilder::new(77, ParcelType::Stream)
            .compression(Compression::Gzip)
            .payload(body.clone())
            .build()
            .unwrap();

        let mut buf = BytesMut::from(&encoded.concat()[..]);
        let records = StructDecoder::new().decode_all(&mut buf).unwrap();
        assert!(buf.is_empty());

        let mut reassembler = Reassembler::new();
        let mut result = None;
        for record in records {
            match record {
                WireStruct::Parcel(p) => {
                    assert_eq!(p.compression, Compression::Gzip);
                    reassembler.expect(&p).unwrap();
                }
                WireStruct::Chunk(c) => result = reassembler.add_chunk(c).unwrap(),
            }
        }
        assert_eq!(result, Some(body));
    }

    #[test]
    fn test_builder_rejects_bad_fragment_size() {
        assert!(ParcelBuilder::new(1, ParcelType::Event)
            .fragment_size(0)
            .is_err());
    }

    #[test]
    fn test_header_length_overflow() {
        let mut header = ParcelBuilder::new(1, ParcelType::Event).header();
        header.length = MAX_PARCEL_LENGTH + 1;
        assert!(header.encode().is_err());
    }
}
