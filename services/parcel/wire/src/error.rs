//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer shorter than the fields being read
    #[error("out of bounds: need {needed} bytes, have {available}")]
    OutOfBounds {
        /// Bytes required to read the field
        needed: usize,
        /// Bytes actually available
        available: usize,
    },

    /// A fixed-position field failed to parse
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// Leading tag is neither parcel nor chunk
    #[error("unknown struct type {0}")]
    UnknownStructType(u8),

    /// Length does not fit in its fixed-width field
    #[error("length {0} overflows its field")]
    LengthOverflow(u64),

    /// Declared length disagrees with the payload handed to an encoder
    #[error("length mismatch: declared {declared}, payload has {actual}")]
    LengthMismatch {
        /// Length carried in the record
        declared: usize,
        /// Actual payload byte length
        actual: usize,
    },

    /// Decoded payload is shorter than its header declares
    #[error("truncated payload: declared {declared}, available {available}")]
    TruncatedPayload {
        /// Length carried in the chunk header
        declared: usize,
        /// Payload bytes present in the buffer
        available: usize,
    },

    /// Unsupported protocol version
    #[error("version unsupported: {0}")]
    Version(u16),

    /// Fragment size outside 1..=65535
    #[error("invalid fragment size: {0}")]
    FragmentSize(usize),

    /// Chunk arrived out of sequence during reassembly
    #[error("parcel {parcel_id}: expected chunk {expected}, got {got}")]
    ChunkSequence {
        /// Owning parcel
        parcel_id: u32,
        /// Next chunk id the reassembler was waiting for
        expected: u32,
        /// Chunk id that arrived
        got: u32,
    },

    /// Chunk for a parcel that was never announced
    #[error("unknown parcel {0}")]
    UnknownParcel(u32),

    /// Reassembler already tracks its maximum number of incomplete parcels
    #[error("too many pending parcels: limit {0}")]
    TooManyPending(usize),
}
