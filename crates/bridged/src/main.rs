//! bridged — demo wiring two device bridges back-to-back over an in-process
//! loopback transport, to exercise the chunked framing protocol end to end.
//!
//! Not a mesh node: there is no real transport, registry, or handshake here.
//! It exists to show the bridge driving a Device/Relay pair the way a real
//! daemon would.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::Result;
use bridge::{Device, DeviceBridge, DeviceId, Relay, UpdateDelayPolicy};
use bridge_core::config::BridgeConfig;
use bridge_core::BridgeError;

/// An in-process transport that caps each write at `max_frame` bytes,
/// forcing the chunking protocol to actually chunk.
struct LoopbackDevice {
    label: &'static str,
    max_frame: usize,
    outbound: SyncSender<Vec<u8>>,
    inbound: Mutex<Receiver<Vec<u8>>>,
    bridge: Mutex<Option<Weak<DeviceBridge>>>,
    update_delay: Mutex<UpdateDelayPolicy>,
}

impl Device for LoopbackDevice {
    fn on_attach(&self, bridge: Weak<DeviceBridge>) {
        *self.bridge.lock().unwrap() = Some(bridge);
    }

    fn on_receive(&self) -> Result<(), BridgeError> {
        let inbound = self.inbound.lock().unwrap();
        while let Ok(frame) = inbound.try_recv() {
            if let Some(bridge) = self.bridge.lock().unwrap().as_ref().and_then(Weak::upgrade) {
                bridge.pass_network_packet(&frame);
            }
        }
        Ok(())
    }

    fn on_send_to_channel_internal(&self, frame: &[u8]) -> Result<usize, BridgeError> {
        let accepted = frame.len().min(self.max_frame);
        self.outbound
            .send(frame[..accepted].to_vec())
            .map_err(|e| BridgeError::TransportTransient(e.to_string()))?;
        Ok(accepted)
    }

    fn on_command_from_connector(&self, _bytes: &[u8]) {}
    fn on_run_command(&self, _bytes: &[u8]) -> Vec<u8> {
        Vec::new()
    }
    fn on_who_am_i(&self) -> Vec<u8> {
        self.label.as_bytes().to_vec()
    }
    fn get_update_delay(&self) -> Duration {
        self.update_delay.lock().unwrap().next_delay()
    }
    fn set_update_delay_range(&self, min: Duration, max: Duration) {
        *self.update_delay.lock().unwrap() = UpdateDelayPolicy::Range(min, max);
    }
    fn set_update_delay_fixed(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = UpdateDelayPolicy::Fixed(delay);
    }
    fn is_channel(&self) -> bool {
        true
    }
}

struct LoggingRelay;

impl Relay for LoggingRelay {
    fn on_packet_received(&self, packet: Vec<u8>, bridge: &DeviceBridge) {
        tracing::info!(did = bridge.did(), bytes = packet.len(), "packet received");
        if let Ok(text) = String::from_utf8(packet) {
            tracing::info!(%text, "decoded as utf-8");
        }
    }

    fn post_command_to_connector(&self, bytes: Vec<u8>, bridge: &DeviceBridge) {
        tracing::debug!(did = bridge.did(), bytes = bytes.len(), "command posted to connector");
    }

    fn detach_device(&self, did: DeviceId) {
        tracing::info!(did, "relay detaching bridge");
    }

    fn log(&self, message: &str, did: DeviceId) {
        tracing::info!(did, message, "relay log");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = BridgeConfig::load().unwrap_or_default();
    tracing::info!(min_frame_size = config.min_frame_size, "bridged starting");

    let (a_to_b_tx, a_to_b_rx) = sync_channel::<Vec<u8>>(64);
    let (b_to_a_tx, b_to_a_rx) = sync_channel::<Vec<u8>>(64);

    let device_a = Arc::new(LoopbackDevice {
        label: "device-a",
        max_frame: 32,
        outbound: a_to_b_tx,
        inbound: Mutex::new(b_to_a_rx),
        bridge: Mutex::new(None),
        update_delay: Mutex::new(UpdateDelayPolicy::Range(
            config.update_delay.min(),
            config.update_delay.max(),
        )),
    });
    let device_b = Arc::new(LoopbackDevice {
        label: "device-b",
        max_frame: 32,
        outbound: b_to_a_tx,
        inbound: Mutex::new(a_to_b_rx),
        bridge: Mutex::new(None),
        update_delay: Mutex::new(UpdateDelayPolicy::Range(
            config.update_delay.min(),
            config.update_delay.max(),
        )),
    });

    let relay = Arc::new(LoggingRelay);

    let bridge_a = DeviceBridge::new(
        1,
        bridge::type_name_hash::<LoopbackDevice>(),
        device_a,
        relay.clone(),
        false,
        false,
        &[],
        &config,
    )?;
    let bridge_b = DeviceBridge::new(
        2,
        bridge::type_name_hash::<LoopbackDevice>(),
        device_b,
        relay,
        false,
        false,
        &[],
        &config,
    )?;

    bridge_a.start_updating_in_separate_thread();
    bridge_b.start_updating_in_separate_thread();

    let message = b"hello across the mesh, in more than thirty-two bytes per frame".to_vec();
    bridge_a.send(&message)?;

    std::thread::sleep(Duration::from_millis(200));

    bridge_a.detach();
    bridge_b.detach();

    Ok(())
}
