// ABOUTME: Interface to the external messaging session (the sidecar or a test double).
// ABOUTME: Defines connection states, number status and the MessagingClient trait.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::recipients::ChatId;

/// Lifecycle state reported by the messaging session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Session is starting up or waiting for pairing
    Connecting,
    /// Session is logged in and ready to send
    Connected,
    /// Another client took over the session
    Conflicted,
    /// Device was unpaired; a new QR scan is required
    Unpaired,
    /// Any label we have no special handling for
    Other(String),
}

impl ConnectionState {
    /// Map a state label emitted by the messaging session.
    pub fn from_label(label: &str) -> Self {
        match label {
            "CONNECTED" | "inChat" | "isLogged" => Self::Connected,
            "CONFLICT" => Self::Conflicted,
            "UNPAIRED" | "UNPAIRED_IDLE" => Self::Unpaired,
            "OPENING" | "PAIRING" | "CONNECTING" => Self::Connecting,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Unpaired => write!(f, "unpaired"),
            Self::Other(label) => write!(f, "{}", label),
        }
    }
}

/// Result of asking the session whether a number can receive messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberStatus {
    #[serde(rename = "canReceiveMessage", default)]
    pub can_receive_message: bool,
}

/// Boxed stream of connection state changes
pub type StateStream = Pin<Box<dyn Stream<Item = ConnectionState> + Send>>;

/// A connected messaging session.
///
/// The session itself (browser automation, pairing, protocol) lives outside
/// this crate; implementations only translate calls and state changes.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Take the stream of state changes. Can only be taken once.
    async fn state_stream(&self) -> Result<StateStream>;

    /// Ask whether `chat_id` is reachable on the service
    async fn check_status(&self, chat_id: &ChatId) -> Result<NumberStatus>;

    /// Send a plain text message
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()>;

    /// Claim the session for this client after a conflict
    async fn claim_session(&self) -> Result<()>;

    /// Gracefully shut down the session
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_labels_map_to_connected() {
        for label in ["CONNECTED", "inChat", "isLogged"] {
            assert_eq!(ConnectionState::from_label(label), ConnectionState::Connected);
        }
    }

    #[test]
    fn test_conflict_and_unpaired_labels() {
        assert_eq!(ConnectionState::from_label("CONFLICT"), ConnectionState::Conflicted);
        assert_eq!(ConnectionState::from_label("UNPAIRED"), ConnectionState::Unpaired);
        assert_eq!(
            ConnectionState::from_label("UNPAIRED_IDLE"),
            ConnectionState::Unpaired
        );
    }

    #[test]
    fn test_unknown_label_is_preserved() {
        let state = ConnectionState::from_label("TIMEOUT");
        assert_eq!(state, ConnectionState::Other("TIMEOUT".to_string()));
        assert_eq!(state.to_string(), "TIMEOUT");
        assert!(!state.is_ready());
    }

    #[test]
    fn test_number_status_parses_wire_shape() {
        let status: NumberStatus =
            serde_json::from_str(r#"{"canReceiveMessage": true, "numberExists": true}"#).unwrap();
        assert!(status.can_receive_message);

        let missing: NumberStatus = serde_json::from_str("{}").unwrap();
        assert!(!missing.can_receive_message);
    }
}
