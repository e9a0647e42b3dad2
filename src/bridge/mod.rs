// ABOUTME: Adapter for the messaging session sidecar process.
// ABOUTME: The sidecar hosts the actual session; we talk newline-delimited JSON over its stdio.

pub mod client;
pub mod protocol;

pub use client::BridgeClient;
pub use protocol::{BridgeEvent, BridgeMessage};
