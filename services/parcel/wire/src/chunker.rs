//! Payload splitting and reassembly.
//!
//! The chunker cuts a parcel body into 1-based, size-bounded fragments. The
//! reassembler does the reverse on the receiving side, checking that chunk ids
//! arrive in order and that the body matches the length declared by its
//! parcel header.

use crate::chunk::Chunk;
use crate::parcel::Parcel;
use crate::registry::{ChunkFlags, DEFAULT_FRAGMENT_SIZE, DEFAULT_MAX_PENDING, MAX_CHUNK_PAYLOAD};
use crate::WireError;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

/// One fragment of a parcel body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 1-based position within the body
    pub chunk_id: u32,
    /// Fragment bytes
    pub payload: Bytes,
    /// Byte length of `payload`
    pub length: u16,
}

impl Fragment {
    /// Turn the fragment into a chunk of `parcel_id`
    pub fn into_chunk(self, parcel_id: u32, flags: ChunkFlags) -> Chunk {
        Chunk {
            parcel_id,
            chunk_id: self.chunk_id,
            flags,
            length: self.length,
            payload: self.payload,
        }
    }
}

/// Split `payload` into fragments of at most `max_fragment_size` bytes.
///
/// Always yields at least one fragment: an empty payload becomes a single
/// empty fragment. Marking the final fragment (for example with
/// [`ChunkFlags::STOP`]) is left to the caller.
pub fn split(payload: Bytes, max_fragment_size: usize) -> Result<Vec<Fragment>, WireError> {
    if max_fragment_size == 0 || max_fragment_size > MAX_CHUNK_PAYLOAD {
        return Err(WireError::FragmentSize(max_fragment_size));
    }

    if payload.is_empty() {
        return Ok(vec![Fragment {
            chunk_id: 1,
            payload,
            length: 0,
        }]);
    }

    let total = payload.len().div_ceil(max_fragment_size);
    let mut fragments = Vec::with_capacity(total);
    let mut offset = 0;

    for index in 0..total {
        let end = std::cmp::min(offset + max_fragment_size, payload.len());
        let chunk_id = u32::try_from(index + 1)
            .map_err(|_| WireError::LengthOverflow(payload.len() as u64))?;
        fragments.push(Fragment {
            chunk_id,
            payload: payload.slice(offset..end),
            // bounded by MAX_CHUNK_PAYLOAD above
            length: (end - offset) as u16,
        });
        offset = end;
    }

    Ok(fragments)
}

/// Chunker with a fixed fragment size
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    fragment_size: usize,
}

impl Chunker {
    /// Create a chunker with the default fragment size
    pub fn new() -> Self {
        Self {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
        }
    }

    /// Create a chunker with a custom fragment size (1..=65535)
    pub fn with_fragment_size(fragment_size: usize) -> Result<Self, WireError> {
        if fragment_size == 0 || fragment_size > MAX_CHUNK_PAYLOAD {
            return Err(WireError::FragmentSize(fragment_size));
        }
        Ok(Self { fragment_size })
    }

    /// Configured fragment size
    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    /// Split a payload into fragments
    pub fn split(&self, payload: Bytes) -> Result<Vec<Fragment>, WireError> {
        split(payload, self.fragment_size)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Pending {
    expected_len: usize,
    next_chunk: u32,
    body: BytesMut,
}

/// Reassembler for collecting chunks into complete parcel bodies.
///
/// Bodies grow only as chunk bytes arrive. At most `max_pending` parcels are
/// tracked at once; callers drop abandoned ones with [`Reassembler::cancel`].
#[derive(Debug)]
pub struct Reassembler {
    parcels: HashMap<u32, Pending>,
    max_pending: usize,
}

impl Reassembler {
    /// Create a reassembler tracking up to [`DEFAULT_MAX_PENDING`] parcels
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    /// Create a reassembler tracking up to `max_pending` parcels
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            parcels: HashMap::new(),
            max_pending,
        }
    }

    /// Register a parcel header so its chunks can be collected.
    ///
    /// Re-registering a parcel id discards whatever was buffered for it and
    /// does not count against the limit.
    pub fn expect(&mut self, parcel: &Parcel) -> Result<(), WireError> {
        if !self.parcels.contains_key(&parcel.parcel_id) && self.parcels.len() >= self.max_pending
        {
            return Err(WireError::TooManyPending(self.max_pending));
        }

        self.parcels.insert(
            parcel.parcel_id,
            Pending {
                expected_len: parcel.length as usize,
                next_chunk: 1,
                body: BytesMut::new(),
            },
        );
        Ok(())
    }

    /// Drop the buffered state of one parcel. Returns false if it was not pending.
    pub fn cancel(&mut self, parcel_id: u32) -> bool {
        self.parcels.remove(&parcel_id).is_some()
    }

    /// Drop every pending parcel
    pub fn clear(&mut self) {
        self.parcels.clear();
    }

    /// Add a chunk and return the body once it is complete.
    ///
    /// A failed chunk drops the parcel's buffered state.
    pub fn add_chunk(&mut self, chunk: Chunk) -> Result<Option<Bytes>, WireError> {
        let parcel_id = chunk.parcel_id;
        let pending = self
            .parcels
            .get_mut(&parcel_id)
            .ok_or(WireError::UnknownParcel(parcel_id))?;

        if chunk.chunk_id != pending.next_chunk {
            let expected = pending.next_chunk;
            self.parcels.remove(&parcel_id);
            return Err(WireError::ChunkSequence {
                parcel_id,
                expected,
                got: chunk.chunk_id,
            });
        }

        let actual = pending.body.len() + chunk.payload.len();
        if actual > pending.expected_len {
            let declared = pending.expected_len;
            self.parcels.remove(&parcel_id);
            return Err(WireError::LengthMismatch { declared, actual });
        }

        pending.body.extend_from_slice(&chunk.payload);
        pending.next_chunk += 1;

        if pending.body.len() == pending.expected_len {
            Ok(self
                .parcels
                .remove(&parcel_id)
                .map(|done| done.body.freeze()))
        } else {
            Ok(None)
        }
    }

    /// Number of parcels still waiting for chunks
    pub fn pending(&self) -> usize {
        self.parcels.len()
    }

    /// Bytes currently buffered across all pending parcels
    pub fn buffered(&self) -> usize {
        self.parcels.values().map(|p| p.body.len()).sum()
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
