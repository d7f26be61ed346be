//! bridge — the device bridge: lifecycle, chunked framing, and the receive
//! worker that sits between a transport `Device` and the `Relay` routing
//! fabric.

pub mod device_bridge;
pub mod qos;
pub mod traits;

pub use device_bridge::{DeviceBridge, DeviceId};
pub use traits::{type_name_hash, Device, Relay, UpdateDelayPolicy};
