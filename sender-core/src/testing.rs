// ABOUTME: Scripted MessagingClient for tests - no sidecar process required.
// ABOUTME: Records every call with its tokio timestamp so pacing can be asserted.
//!
//! # Example
//!
//! ```no_run
//! use sender_core::testing::MockClient;
//! use sender_core::{ChatId, MessagingClient};
//!
//! # async fn example() {
//! let client = MockClient::new()
//!     .reachable(&["111"])
//!     .send_fails("333", "invalid wid");
//!
//! let status = client.check_status(&ChatId::parse("111").unwrap()).await.unwrap();
//! assert!(status.can_receive_message);
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::recipients::ChatId;
use crate::traits::{ConnectionState, MessagingClient, NumberStatus, StateStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Check,
    Send,
    Claim,
}

/// One call made against the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub chat_id: Option<String>,
    pub text: Option<String>,
    pub at: Instant,
}

pub struct MockClient {
    reachable: HashSet<String>,
    check_errors: HashMap<String, String>,
    check_panics: HashSet<String>,
    send_errors: HashMap<String, String>,
    calls: Mutex<Vec<RecordedCall>>,
    states_tx: Mutex<Option<mpsc::UnboundedSender<ConnectionState>>>,
    states_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnectionState>>>,
}

fn key(number: &str) -> String {
    ChatId::parse(number)
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|_| number.to_string())
}

impl MockClient {
    /// A client where nobody is reachable and every send succeeds
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            reachable: HashSet::new(),
            check_errors: HashMap::new(),
            check_panics: HashSet::new(),
            send_errors: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            states_tx: Mutex::new(Some(tx)),
            states_rx: Mutex::new(Some(rx)),
        }
    }

    /// Mark numbers (raw or qualified) as reachable
    pub fn reachable(mut self, numbers: &[&str]) -> Self {
        self.reachable.extend(numbers.iter().map(|n| key(n)));
        self
    }

    /// Make the status check for `number` fail with `message`
    pub fn check_fails(mut self, number: &str, message: &str) -> Self {
        self.check_errors.insert(key(number), message.to_string());
        self
    }

    /// Make the status check for `number` panic, as a broken session would
    pub fn check_panics(mut self, number: &str) -> Self {
        self.check_panics.insert(key(number));
        self
    }

    /// Make sending to `number` fail with `message`. Implies reachable.
    pub fn send_fails(mut self, number: &str, message: &str) -> Self {
        let k = key(number);
        self.reachable.insert(k.clone());
        self.send_errors.insert(k, message.to_string());
        self
    }

    /// Queue a state change for the state stream
    pub fn emit(&self, state: ConnectionState) {
        if let Some(tx) = self.states_tx.lock().unwrap().as_ref() {
            let _ = tx.send(state);
        }
    }

    /// End the state stream once queued states are consumed
    pub fn close_states(&self) {
        self.states_tx.lock().unwrap().take();
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind == kind)
            .collect()
    }

    /// Chat ids checked, in call order
    pub fn checked(&self) -> Vec<String> {
        self.calls_of(CallKind::Check)
            .into_iter()
            .filter_map(|c| c.chat_id)
            .collect()
    }

    /// Chat ids sent to (including failed sends), in call order
    pub fn sent_to(&self) -> Vec<String> {
        self.calls_of(CallKind::Send)
            .into_iter()
            .filter_map(|c| c.chat_id)
            .collect()
    }

    /// Timestamps of every send attempt
    pub fn send_times(&self) -> Vec<Instant> {
        self.calls_of(CallKind::Send).into_iter().map(|c| c.at).collect()
    }

    pub fn claims(&self) -> usize {
        self.calls_of(CallKind::Claim).len()
    }

    fn record(&self, kind: CallKind, chat_id: Option<&ChatId>, text: Option<&str>) {
        self.calls.lock().unwrap().push(RecordedCall {
            kind,
            chat_id: chat_id.map(|id| id.as_str().to_string()),
            text: text.map(String::from),
            at: Instant::now(),
        });
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingClient for MockClient {
    async fn state_stream(&self) -> Result<StateStream> {
        let rx = self
            .states_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("State stream already taken"))?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn check_status(&self, chat_id: &ChatId) -> Result<NumberStatus> {
        self.record(CallKind::Check, Some(chat_id), None);
        if self.check_panics.contains(chat_id.as_str()) {
            panic!("status check for {} panicked", chat_id);
        }
        if let Some(message) = self.check_errors.get(chat_id.as_str()) {
            anyhow::bail!("{}", message);
        }
        Ok(NumberStatus {
            can_receive_message: self.reachable.contains(chat_id.as_str()),
        })
    }

    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()> {
        self.record(CallKind::Send, Some(chat_id), Some(text));
        if let Some(message) = self.send_errors.get(chat_id.as_str()) {
            anyhow::bail!("{}", message);
        }
        Ok(())
    }

    async fn claim_session(&self) -> Result<()> {
        self.record(CallKind::Claim, None, None);
        Ok(())
    }
}
