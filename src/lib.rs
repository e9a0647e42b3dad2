// ABOUTME: Root library module for the safe-sender binary
// ABOUTME: Hosts the sidecar bridge, HTTP surface and logging; re-exports the dispatch core

pub mod bridge;
pub mod logging;
pub mod server;

// Re-export platform-agnostic modules from sender-core
pub use sender_core::config;
pub use sender_core::dispatch;
pub use sender_core::eligibility;
pub use sender_core::lifecycle;
pub use sender_core::paths;
pub use sender_core::recipients;
pub use sender_core::testing;
pub use sender_core::traits;

pub use sender_core::{
    ChatId, ConnectionState, LifecycleDriver, MessagingClient, Pacing, RunSummary, SafeSender,
    SessionStatus,
};
