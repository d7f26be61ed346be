//! QoS — per-bridge reassembly buffer and outbound message-id generator.
//!
//! Not a rate limiter: this QoS allocates `message_id`s for outbound chunked
//! sends and reassembles inbound chunks keyed by `(message_id, chunk_id)`,
//! tolerating out-of-order arrival and concurrent in-flight messages.

use std::sync::atomic::{AtomicU32, Ordering};

use bridge_core::wire::{ChunkHeader, HEADER_SIZE};
use bridge_core::BridgeError;
use dashmap::DashMap;

/// Below this accepted-byte count, a chunk write makes no real forward
/// progress and should be retried rather than advanced.
pub const DEFAULT_MIN_FRAME_SIZE: usize = 16;

struct PendingMessage {
    original_size: usize,
    chunks: DashMap<u32, Vec<u8>>,
}

impl PendingMessage {
    fn received_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.value().len()).sum()
    }
}

pub struct QoS {
    next_message_id: AtomicU32,
    pending: DashMap<u32, PendingMessage>,
    max_pending_messages: usize,
}

impl QoS {
    pub fn new(max_pending_messages: usize) -> Self {
        Self {
            next_message_id: AtomicU32::new(0),
            pending: DashMap::new(),
            max_pending_messages,
        }
    }

    /// Allocate the next outbound `message_id`. Monotonically increasing;
    /// safe under concurrent callers.
    pub fn next_outgoing_id(&self) -> u32 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Parse `frame`'s header and buffer its payload. Duplicate
    /// `(message_id, chunk_id)` pairs overwrite in place rather than
    /// double-counting bytes, making re-delivery idempotent.
    pub fn push_received_chunk(&self, frame: &[u8]) -> Result<(), BridgeError> {
        let header = ChunkHeader::parse(frame)?;
        let payload = frame[HEADER_SIZE..].to_vec();

        if !self.pending.contains_key(&header.message_id)
            && self.pending.len() >= self.max_pending_messages
        {
            tracing::warn!(
                message_id = header.message_id,
                limit = self.max_pending_messages,
                "dropping chunk for new message: reassembly buffer at capacity"
            );
            return Ok(());
        }

        let entry = self.pending.entry(header.message_id).or_insert_with(|| PendingMessage {
            original_size: header.original_size as usize,
            chunks: DashMap::new(),
        });
        entry.chunks.insert(header.chunk_id, payload);
        Ok(())
    }

    /// Return a fully reassembled logical packet if one is ready, removing
    /// it from the pending set. Returns `None` if nothing is complete yet.
    pub fn get_next_packet(&self) -> Option<Vec<u8>> {
        let ready_id = self
            .pending
            .iter()
            .find(|entry| entry.value().received_bytes() >= entry.value().original_size)
            .map(|entry| *entry.key())?;

        let (_, msg) = self.pending.remove(&ready_id)?;
        let mut ids: Vec<u32> = msg.chunks.iter().map(|c| *c.key()).collect();
        ids.sort_unstable();

        let mut out = Vec::with_capacity(msg.original_size);
        for id in ids {
            if let Some(payload) = msg.chunks.get(&id) {
                out.extend_from_slice(&payload);
            }
        }
        out.truncate(msg.original_size);
        Some(out)
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
