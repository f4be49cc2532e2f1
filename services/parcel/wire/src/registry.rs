//! Protocol registry: version, frame sizes, struct tags and field enums.
//!
//! Everything here is plain data. [`REGISTRY`] groups the constants into one
//! read-only value for collaborators that want to look them up by name.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire protocol version
pub const PROTOCOL_VERSION: u16 = 1;

/// Handshake frame size in bytes
pub const HANDSHAKE_SIZE: usize = 36;

/// Bytes of the handshake frame that carry data
pub const HANDSHAKE_DATA_SIZE: usize = 8;

/// Parcel header size in bytes
pub const PARCEL_HEADER_SIZE: usize = 16;

/// Chunk header size in bytes (payload follows)
pub const CHUNK_HEADER_SIZE: usize = 12;

/// Width of the ASCII decimal length field in a parcel header
pub const PARCEL_LENGTH_DIGITS: usize = 8;

/// Largest body length a parcel header can express
pub const MAX_PARCEL_LENGTH: u64 = 99_999_999;

/// Largest payload a single chunk can carry
pub const MAX_CHUNK_PAYLOAD: usize = u16::MAX as usize;

/// Default fragment size used by the chunker
pub const DEFAULT_FRAGMENT_SIZE: usize = 2048;

/// Default limit on incomplete parcels held by a reassembler
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Fixed frame sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSizes {
    /// Handshake frame
    pub handshake: usize,
    /// Parcel header
    pub parcel_header: usize,
    /// Chunk header, excluding payload
    pub chunk_header: usize,
}

/// Struct-type tags used for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructTags {
    /// Parcel tag
    pub parcel: u8,
    /// Chunk tag
    pub chunk: u8,
}

/// Read-only view of every protocol constant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registry {
    /// Protocol version written into handshakes
    pub version: u16,
    /// Fixed frame sizes
    pub frame_sizes: FrameSizes,
    /// Dispatch tags
    pub tags: StructTags,
    /// Parcel types in wire order
    pub parcel_types: [ParcelType; 6],
}

/// The process-wide protocol registry
pub const REGISTRY: Registry = Registry {
    version: PROTOCOL_VERSION,
    frame_sizes: FrameSizes {
        handshake: HANDSHAKE_SIZE,
        parcel_header: PARCEL_HEADER_SIZE,
        chunk_header: CHUNK_HEADER_SIZE,
    },
    tags: StructTags {
        parcel: StructType::Parcel as u8,
        chunk: StructType::Chunk as u8,
    },
    parcel_types: [
        ParcelType::Ping,
        ParcelType::Pong,
        ParcelType::Call,
        ParcelType::Callback,
        ParcelType::Event,
        ParcelType::Stream,
    ],
};

/// Leading tag of a parcel or chunk buffer
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructType {
    /// Parcel header
    Parcel = 0,
    /// Chunk with payload
    Chunk = 1,
}

impl TryFrom<u8> for StructType {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StructType::Parcel),
            1 => Ok(StructType::Chunk),
            _ => Err(crate::WireError::UnknownStructType(value)),
        }
    }
}

/// Kind of message a parcel carries
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParcelType {
    /// Liveness probe
    Ping = 0,
    /// Reply to a ping
    Pong = 1,
    /// Remote call
    Call = 2,
    /// Reply to a call
    Callback = 3,
    /// Fire-and-forget event
    Event = 4,
    /// Stream data
    Stream = 5,
}

impl TryFrom<u8> for ParcelType {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ParcelType::Ping),
            1 => Ok(ParcelType::Pong),
            2 => Ok(ParcelType::Call),
            3 => Ok(ParcelType::Callback),
            4 => Ok(ParcelType::Event),
            5 => Ok(ParcelType::Stream),
            _ => Err(crate::WireError::MalformedFrame("parcel type")),
        }
    }
}

impl ParcelType {
    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            ParcelType::Ping => "ping",
            ParcelType::Pong => "pong",
            ParcelType::Call => "call",
            ParcelType::Callback => "callback",
            ParcelType::Event => "event",
            ParcelType::Stream => "stream",
        }
    }
}

/// Body compression declared by a parcel
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None = 0,
    /// gzip
    Gzip = 1,
}

impl TryFrom<u8> for Compression {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Gzip),
            _ => Err(crate::WireError::MalformedFrame("compression")),
        }
    }
}

impl Compression {
    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
        }
    }
}

/// Body serialization format declared by a parcel
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// Raw bytes
    #[default]
    Binary = 0,
    /// Protocol-native record notation
    Jstp = 1,
    /// JSON
    Json = 2,
    /// BSON
    Bson = 3,
    /// Runtime-native object serialization
    V8 = 4,
}

impl TryFrom<u8> for Encoding {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Encoding::Binary),
            1 => Ok(Encoding::Jstp),
            2 => Ok(Encoding::Json),
            3 => Ok(Encoding::Bson),
            4 => Ok(Encoding::V8),
            _ => Err(crate::WireError::MalformedFrame("encoding")),
        }
    }
}

impl Encoding {
    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Binary => "binary",
            Encoding::Jstp => "jstp",
            Encoding::Json => "json",
            Encoding::Bson => "bson",
            Encoding::V8 => "v8",
        }
    }
}

/// Handshake status byte
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandshakeStatus {
    /// Open a new session
    #[default]
    New = 0,
    /// Restore an existing session by token
    Restore = 1,
}

impl TryFrom<u8> for HandshakeStatus {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HandshakeStatus::New),
            1 => Ok(HandshakeStatus::Restore),
            _ => Err(crate::WireError::MalformedFrame("handshake status")),
        }
    }
}

/// Error returned when parsing an enum from its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(
    /// Name that matched no variant
    pub String,
);

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name '{}'", self.0)
    }
}

impl std::error::Error for UnknownName {}

macro_rules! impl_from_str {
    ($ty:ty, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.to_ascii_lowercase();
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.name() == wanted)
                    .ok_or_else(|| UnknownName(s.to_string()))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

impl_from_str!(
    ParcelType,
    [
        ParcelType::Ping,
        ParcelType::Pong,
        ParcelType::Call,
        ParcelType::Callback,
        ParcelType::Event,
        ParcelType::Stream,
    ]
);
impl_from_str!(Compression, [Compression::None, Compression::Gzip]);
impl_from_str!(
    Encoding,
    [
        Encoding::Binary,
        Encoding::Jstp,
        Encoding::Json,
        Encoding::Bson,
        Encoding::V8,
    ]
);

bitflags! {
    /// Chunk flow-control flags. Defined for collaborators; the codec does not act on them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ChunkFlags: u8 {
        /// More chunks follow
        const MORE = 1 << 0;
        /// Sender stopped the parcel
        const STOP = 1 << 1;
        /// Receiver asks the sender to pause
        const PAUSE = 1 << 2;
        /// Receiver asks the sender to resume
        const RESUME = 1 << 3;
    }
}

impl Default for ChunkFlags {
    fn default() -> Self {
        Self::empty()
    }
}
