//! DeviceBridge — the adapter between a transport [`Device`](crate::traits::Device)
//! and the [`Relay`](crate::traits::Relay) routing fabric: lifecycle,
//! chunked framing, and the receive worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use bridge_core::bytebuf::ByteView;
use bridge_core::config::BridgeConfig;
use bridge_core::wire::{ChunkHeader, HEADER_SIZE};
use bridge_core::BridgeError;
use zerocopy::AsBytes;

use crate::qos::QoS;
use crate::traits::{Device, Relay};

/// Locally unique identifier the Relay assigns a bridge at registration.
pub type DeviceId = u64;

pub struct DeviceBridge {
    did: DeviceId,
    type_name_hash: u64,
    device: Arc<dyn Device>,
    relay: Arc<dyn Relay>,
    is_negotiation_channel: bool,
    is_slave: bool,
    input_id: Option<Vec<u8>>,
    output_id: Option<Vec<u8>>,
    non_negotiated_arguments: Vec<u8>,
    qos: QoS,
    min_frame_size: usize,
    is_alive: AtomicBool,
    write_mutex: Mutex<()>,
    error: Mutex<Option<String>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    negotiation_multi_chunk_warned: AtomicBool,
}

impl DeviceBridge {
    /// Construct a bridge and deliver the one-shot `on_attach` back-reference
    /// to `device`. On a negotiation channel, `args` must open with two
    /// length-prefixed byte vectors `(input_id, output_id)`; anything after
    /// them is retained verbatim as `non_negotiated_arguments`.
    pub fn new(
        did: DeviceId,
        type_name_hash: u64,
        device: Arc<dyn Device>,
        relay: Arc<dyn Relay>,
        is_negotiation_channel: bool,
        is_slave: bool,
        args: &[u8],
        config: &BridgeConfig,
    ) -> Result<Arc<Self>, BridgeError> {
        let (input_id, output_id, non_negotiated_arguments) = if is_negotiation_channel {
            let mut view = ByteView::new(args);
            let input_id = view.read_length_prefixed()?.to_vec();
            let output_id = view.read_length_prefixed()?.to_vec();
            (Some(input_id), Some(output_id), view.rest().to_vec())
        } else {
            (None, None, Vec::new())
        };

        let bridge = Arc::new(DeviceBridge {
            did,
            type_name_hash,
            device: device.clone(),
            relay,
            is_negotiation_channel,
            is_slave,
            input_id,
            output_id,
            non_negotiated_arguments,
            qos: QoS::new(config.max_pending_messages),
            min_frame_size: config.min_frame_size,
            is_alive: AtomicBool::new(true),
            write_mutex: Mutex::new(()),
            error: Mutex::new(None),
            worker: Mutex::new(None),
            negotiation_multi_chunk_warned: AtomicBool::new(false),
        });

        device.on_attach(Arc::downgrade(&bridge));
        Ok(bridge)
    }

    // ── accessors ──────────────────────────────────────────────────────────

    pub fn did(&self) -> DeviceId {
        self.did
    }

    pub fn type_name_hash(&self) -> u64 {
        self.type_name_hash
    }

    pub fn is_negotiation_channel(&self) -> bool {
        self.is_negotiation_channel
    }

    pub fn is_slave(&self) -> bool {
        self.is_slave
    }

    pub fn input_id(&self) -> Option<&[u8]> {
        self.input_id.as_deref()
    }

    pub fn output_id(&self) -> Option<&[u8]> {
        self.output_id.as_deref()
    }

    pub fn non_negotiated_arguments(&self) -> &[u8] {
        &self.non_negotiated_arguments
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::SeqCst)
    }

    pub fn set_error_status(&self, message: impl Into<String>) {
        *self.error.lock().unwrap() = Some(message.into());
    }

    pub fn get_error_status(&self) -> Option<String> {
        self.error.lock().unwrap().clone()
    }

    // ── sending ──────────────────────────────────────────────────────────────

    /// Send a logical packet, framing and chunking it as needed. Serialized
    /// against every other writer into the Device.
    pub fn send(&self, packet: &[u8]) -> Result<(), BridgeError> {
        let _guard = self.write_mutex.lock().unwrap();

        if self.is_negotiation_channel {
            let sent = self.device.on_send_to_channel_internal(packet).map_err(|e| {
                self.set_error_status(e.to_string());
                e
            })?;
            if sent != packet.len() {
                let err = BridgeError::NegotiationChunkingViolation {
                    expected: packet.len(),
                    actual: sent,
                };
                self.set_error_status(err.to_string());
                return Err(err);
            }
            return Ok(());
        }

        let message_id = self.qos.next_outgoing_id();
        let original_size = packet.len() as u32;
        let mut offset = 0usize;
        let mut chunk_id: u32 = 0;

        while offset < packet.len() {
            let header = ChunkHeader::new(message_id, chunk_id, original_size);
            let mut frame = Vec::with_capacity(HEADER_SIZE + (packet.len() - offset));
            frame.extend_from_slice(header.as_bytes());
            frame.extend_from_slice(&packet[offset..]);

            let sent = self.device.on_send_to_channel_internal(&frame).map_err(|e| {
                self.set_error_status(e.to_string());
                tracing::error!(did = self.did, error = %e, "transport error while sending chunk");
                e
            })?;

            if sent >= self.min_frame_size || sent == frame.len() {
                let payload_sent = sent.saturating_sub(HEADER_SIZE);
                offset += payload_sent;
                chunk_id += 1;
            }
            // else: transport signaled "too small" — retry this exact chunk.
        }

        Ok(())
    }

    // ── receiving ────────────────────────────────────────────────────────────

    /// Invoked by the Device when a transport frame arrives. May run on the
    /// worker thread or on a transport-internal thread concurrently with it.
    pub fn pass_network_packet(self: &Arc<Self>, frame: &[u8]) {
        if self.is_negotiation_channel && !self.is_slave {
            self.relay.on_packet_received(frame.to_vec(), self);
            return;
        }

        if self.is_negotiation_channel && self.is_slave {
            if let Ok(header) = ChunkHeader::parse(frame) {
                if header.chunk_id > 0 && !self.negotiation_multi_chunk_warned.swap(true, Ordering::SeqCst) {
                    tracing::warn!(
                        did = self.did,
                        message_id = header.message_id,
                        "slave negotiation channel observed a multi-chunk message; \
                         peers must never chunk on a negotiation channel"
                    );
                }
            }
        }

        if let Err(e) = self.qos.push_received_chunk(frame) {
            self.set_error_status(e.to_string());
            tracing::error!(did = self.did, error = %e, "failed to decode inbound chunk");
            return;
        }

        if let Some(packet) = self.qos.get_next_packet() {
            self.relay.on_packet_received(packet, self);
        }
    }

    // ── worker ───────────────────────────────────────────────────────────────

    /// Launch the detached receive worker. The thread holds a strong `Arc`
    /// to the bridge for as long as it runs — `Detach` flips `is_alive`; the
    /// worker observes it on its next tick and drops that handle.
    pub fn start_updating_in_separate_thread(self: &Arc<Self>) {
        let bridge = Arc::clone(self);
        let handle = std::thread::spawn(move || {
            while bridge.is_alive.load(Ordering::SeqCst) {
                std::thread::sleep(bridge.device.get_update_delay());
                if !bridge.is_alive.load(Ordering::SeqCst) {
                    break;
                }
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bridge.device.on_receive())) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        bridge.set_error_status(e.to_string());
                        tracing::error!(did = bridge.did, error = %e, "transport error while updating");
                    }
                    Err(_) => {
                        bridge.set_error_status("unknown fault while updating".to_string());
                        tracing::error!(did = bridge.did, "unknown fault while updating");
                        break;
                    }
                }
            }
            tracing::debug!(did = bridge.did, "receive worker exiting");
        });
        *self.worker.lock().unwrap() = Some(handle);
    }

    // ── lifecycle ────────────────────────────────────────────────────────────

    /// Idempotent: flips the liveness flag so the worker exits on its next
    /// tick. Calling it again has no further effect.
    pub fn detach(&self) {
        self.is_alive.store(false, Ordering::SeqCst);
    }

    /// Ask the Relay to remove this bridge from its registry by `did`; the
    /// Relay is expected to call `Detach` in response.
    pub fn close(&self) {
        self.relay.detach_device(self.did);
    }

    // ── command plane ────────────────────────────────────────────────────────

    pub fn post_command_to_connector(&self, bytes: Vec<u8>) {
        self.relay.post_command_to_connector(bytes, self);
    }

    pub fn on_command_from_connector(&self, bytes: &[u8]) {
        let _guard = self.write_mutex.lock().unwrap();
        self.device.on_command_from_connector(bytes);
    }

    pub fn run_command(&self, bytes: &[u8]) -> Vec<u8> {
        self.device.on_run_command(bytes)
    }

    pub fn who_are_you(&self) -> Vec<u8> {
        self.device.on_who_am_i()
    }

    #[cfg(test)]
    pub(crate) fn join_worker_for_test(&self) {
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }
}
