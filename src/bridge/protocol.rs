// ABOUTME: Line protocol spoken with the sidecar: requests out, responses and events in.
// ABOUTME: One JSON object per line; responses carry the request id, events carry an `event` tag.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METHOD_CHECK_STATUS: &str = "checkNumberStatus";
pub const METHOD_SEND_TEXT: &str = "sendText";
pub const METHOD_USE_HERE: &str = "useHere";
pub const METHOD_CLOSE: &str = "close";

#[derive(Debug, Serialize)]
pub struct BridgeRequest<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl BridgeRequest<'_> {
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self).context("Failed to encode bridge request")?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BridgeError {
    pub message: String,
}

/// Unsolicited notifications from the sidecar
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum BridgeEvent {
    /// Session state label, e.g. CONNECTED, CONFLICT, UNPAIRED
    State { state: String },
    /// Login QR code rendered as text
    Qr { ascii: String },
    /// Session startup progress, e.g. isLogged, qrReadSuccess
    Status { status: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BridgeMessage {
    Response {
        id: u64,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<BridgeError>,
    },
    Event(BridgeEvent),
}

impl BridgeMessage {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim())
            .with_context(|| format!("Unrecognized bridge output: {}", line.trim()))
    }
}
