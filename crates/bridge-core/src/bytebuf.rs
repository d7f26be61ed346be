//! ByteView / ByteVector — typed read/write cursors over byte buffers, and
//! the length-prefixed field codec used to decode negotiation-channel
//! arguments.
//!
//! `ByteView` borrows; `ByteVector` owns. Both advance a cursor as fields are
//! consumed or appended, the way a parser walks a packet without copying it
//! up front.

use crate::error::BridgeError;

/// A read-only cursor over a borrowed byte slice.
pub struct ByteView<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteView<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn read_u32(&mut self) -> Result<u32, BridgeError> {
        if self.remaining() < 4 {
            return Err(BridgeError::DecodeFailure {
                reason: format!("need 4 bytes for u32, have {}", self.remaining()),
            });
        }
        let v = u32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    /// Read a length-prefixed byte vector: a 4-byte little-endian length
    /// followed by that many bytes.
    pub fn read_length_prefixed(&mut self) -> Result<&'a [u8], BridgeError> {
        let len = self.read_u32()? as usize;
        if self.remaining() < len {
            return Err(BridgeError::DecodeFailure {
                reason: format!(
                    "length-prefixed field claims {len} bytes, only {} remain",
                    self.remaining()
                ),
            });
        }
        let field = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(field)
    }
}

/// An owned, growable byte buffer with the same length-prefixed codec for
/// the write side (encoding negotiation arguments for tests and stub
/// devices).
#[derive(Debug, Default, Clone)]
pub struct ByteVector(Vec<u8>);

impl ByteVector {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn write_length_prefixed(&mut self, field: &[u8]) -> &mut Self {
        self.0.extend_from_slice(&(field.len() as u32).to_le_bytes());
        self.0.extend_from_slice(field);
        self
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}
