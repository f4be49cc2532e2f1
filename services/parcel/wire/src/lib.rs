//! Wire codecs for the parcel transport protocol.
//!
//! This crate converts the protocol's three fixed-layout records to and from
//! their exact byte form. It also splits message bodies into ordered chunk
//! fragments and puts them back together. It performs no I/O: a session
//! layer feeds it bytes and receives records, or the other way round.
//!
//! ## Records
//!
//! - **Handshake** (36 bytes): exchanged once at connection setup
//! - **Parcel** (16 bytes): envelope announcing one message and its body length
//! - **Chunk** (12 bytes + payload): one fragment of a parcel body
//!
//! ## Wire Format
//!
//! All integers are little-endian. Parcels and chunks start with a one-byte
//! struct-type tag used by [`read_struct`] to pick the decoder.
//!
//! ```text
//! parcel  | 0 | u32 parcel_id | u8 type | u8 cmp | u8 enc | "00000123" |
//! chunk   | 1 | u32 parcel_id | u32 chunk_id | u8 flags | u16 len | payload |
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod chunker;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod handshake;
pub mod parcel;
pub mod registry;

// Re-export main types
pub use chunk::{peek_payload_length, Chunk};
pub use chunker::{split, Chunker, Fragment, Reassembler};
pub use codec::{EncodedParcel, ParcelBuilder};
pub use dispatch::{read_struct, read_struct_type, StructDecoder, WireStruct};
pub use error::WireError;
pub use handshake::Handshake;
pub use parcel::Parcel;
pub use registry::{
    ChunkFlags, Compression, Encoding, HandshakeStatus, ParcelType, Registry, StructType,
    UnknownName, CHUNK_HEADER_SIZE, DEFAULT_FRAGMENT_SIZE, DEFAULT_MAX_PENDING, HANDSHAKE_SIZE, MAX_CHUNK_PAYLOAD,
    MAX_PARCEL_LENGTH, PARCEL_HEADER_SIZE, PARCEL_LENGTH_DIGITS, PROTOCOL_VERSION, REGISTRY,
};
