//! Chunk wire format — the on-wire header prefixed to every chunked frame.
//!
//! All types are #[repr(C)] for deterministic layout and use zerocopy derives
//! for safe, allocation-free serialization. There is no unsafe code in this
//! module. Fields are fixed little-endian on the wire; this implementation
//! targets little-endian hosts only — read/write go through `zerocopy`
//! directly rather than an explicit byte-swap layer.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Size in bytes of [`ChunkHeader`] on the wire.
pub const HEADER_SIZE: usize = 12;

/// The header prefixed to every chunk on a non-negotiation channel.
///
/// `message_id` and `original_size` are identical across every chunk of one
/// logical packet; `chunk_id` starts at 0 and increments by one per chunk the
/// transport actually accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct ChunkHeader {
    pub message_id: u32,
    pub chunk_id: u32,
    pub original_size: u32,
}

assert_eq_size!(ChunkHeader, [u8; HEADER_SIZE]);

impl ChunkHeader {
    pub fn new(message_id: u32, chunk_id: u32, original_size: u32) -> Self {
        Self {
            message_id,
            chunk_id,
            original_size,
        }
    }

    /// Parse a header from the front of `frame`.
    pub fn parse(frame: &[u8]) -> Result<Self, crate::error::BridgeError> {
        ChunkHeader::read_from_prefix(frame).ok_or_else(|| crate::error::BridgeError::DecodeFailure {
            reason: format!(
                "frame of {} bytes shorter than header size {HEADER_SIZE}",
                frame.len()
            ),
        })
    }
}
