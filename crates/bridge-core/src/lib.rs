//! bridge-core — shared wire format, buffer codec, error taxonomy, and
//! configuration for the device bridge. Every other bridge crate depends on
//! this one.

pub mod bytebuf;
pub mod config;
pub mod error;
pub mod wire;

pub use error::BridgeError;
pub use wire::ChunkHeader;
