//! Device and Relay collaborator traits.
//!
//! Both are capability sets, not inheritance hierarchies — modeled as trait
//! objects the bridge holds by `Arc<dyn _>`, the same dispatch idiom this
//! codebase uses for its other pluggable per-connection handlers.

use std::sync::Weak;
use std::time::Duration;

use bridge_core::BridgeError;

use crate::device_bridge::{DeviceBridge, DeviceId};

/// A transport endpoint the bridge drives. Implementations may be network
/// channels, peripherals, or local connectors; the bridge neither knows nor
/// cares which.
pub trait Device: Send + Sync {
    /// Called once, immediately after the bridge is constructed, handing the
    /// device a back-reference so it can later push inbound frames and
    /// connector commands.
    fn on_attach(&self, bridge: Weak<DeviceBridge>);

    /// Drive inbound I/O for one tick. May block. Errors are logged by the
    /// worker as `TransportTransient` and do not stop the loop.
    fn on_receive(&self) -> Result<(), BridgeError>;

    /// Offer `frame` to the transport; return how many bytes of it were
    /// actually transmitted (`<= frame.len()`). The transport decides how
    /// much of a proposed frame it moves — the bridge treats the return
    /// value as ground truth for cursor advancement.
    fn on_send_to_channel_internal(&self, frame: &[u8]) -> Result<usize, BridgeError>;

    /// Deliver a command from the connector into the device.
    fn on_command_from_connector(&self, bytes: &[u8]);

    /// Synchronous request/response into the device.
    fn on_run_command(&self, bytes: &[u8]) -> Vec<u8>;

    /// Identity probe.
    fn on_who_am_i(&self) -> Vec<u8>;

    /// How long the worker should sleep before the next `on_receive` tick.
    /// May randomize within a configured `[min, max]` range.
    fn get_update_delay(&self) -> Duration;

    /// Configure a randomized update delay in `[min, max]`.
    fn set_update_delay_range(&self, min: Duration, max: Duration);

    /// Configure a fixed update delay.
    fn set_update_delay_fixed(&self, delay: Duration);

    /// Whether this device is a channel (vs. a peripheral/connector-only
    /// device); informational for the Relay, not consulted by the bridge
    /// itself.
    fn is_channel(&self) -> bool;
}

/// The mesh-routing fabric a bridge reports into. Many bridges share one
/// Relay; the bridge never owns or outlives it.
pub trait Relay: Send + Sync {
    /// A fully reassembled logical packet (or, on a master negotiation
    /// channel, a raw unchunked frame) arrived from `bridge`.
    fn on_packet_received(&self, packet: Vec<u8>, bridge: &DeviceBridge);

    /// A command destined for the local connector arrived from `bridge`.
    fn post_command_to_connector(&self, bytes: Vec<u8>, bridge: &DeviceBridge);

    /// Request removal of the bridge identified by `did` from the Relay's
    /// registry. The Relay is expected to call `Detach` on it in response.
    fn detach_device(&self, did: DeviceId);

    /// Operator-facing log sink, independent of `tracing`.
    fn log(&self, message: &str, did: DeviceId);
}

/// A stable hash of a concrete `Device` type's name, used by the Relay to
/// select compatible peers. Folds a BLAKE3 digest of `type_name::<D>()`
/// down to 8 bytes.
pub fn type_name_hash<D: ?Sized>() -> u64 {
    let name = std::any::type_name::<D>();
    let digest = blake3::hash(name.as_bytes());
    u64::from_le_bytes(digest.as_bytes()[0..8].try_into().unwrap())
}

/// Reference implementation of the `get_update_delay`/`set_update_delay_*`
/// policy a `Device` exposes: either a fixed delay, or a delay drawn
/// uniformly from `[min, max]` on every call. Concrete devices are free to
/// ignore this and implement their own policy; it exists so they don't all
/// have to re-derive the randomized case.
pub enum UpdateDelayPolicy {
    Fixed(Duration),
    Range(Duration, Duration),
}

impl UpdateDelayPolicy {
    pub fn next_delay(&self) -> Duration {
        match self {
            UpdateDelayPolicy::Fixed(d) => *d,
            UpdateDelayPolicy::Range(min, max) => {
                if min >= max {
                    return *min;
                }
                use rand::Rng;
                rand::thread_rng().gen_range(*min..*max)
            }
        }
    }
}
