// ABOUTME: The safe sequential send loop: check, send, cool down, one recipient at a time.
// ABOUTME: Per-recipient failures become outcomes; only missing inputs abort a run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::content::{ContentLoader, MessageContent};
use crate::eligibility::EligibilityChecker;
use crate::error::{LoadError, RunError};
use crate::pacing::Pacing;
use crate::recipients::{ChatId, RecipientStore};
use crate::traits::MessagingClient;

/// Error fragments meaning the service will never accept this address.
/// Matched case-insensitively against the send error message.
pub const REJECTION_MARKERS: &[&str] = &["no lid for user", "invalid wid"];

/// Why a send failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    /// The address is structurally invalid for the service; do not retry
    Rejected(String),
    /// Anything else
    Transient(String),
}

/// Sort a send error message into rejected vs transient
pub fn classify_send_error(message: &str) -> SendFailure {
    let lower = message.to_lowercase();
    if REJECTION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        SendFailure::Rejected(message.to_string())
    } else {
        SendFailure::Transient(message.to_string())
    }
}

pub struct Dispatcher<'a> {
    client: &'a dyn MessagingClient,
}

impl<'a> Dispatcher<'a> {
    pub fn new(client: &'a dyn MessagingClient) -> Self {
        Self { client }
    }

    pub async fn send(&self, chat_id: &ChatId, content: &MessageContent) -> Result<(), SendFailure> {
        self.client
            .send_text(chat_id, content.as_str())
            .await
            .map_err(|e| classify_send_error(&format!("{:#}", e)))
    }
}

/// What happened to one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent,
    SkippedIneligible,
    SkippedRejected { reason: String },
    Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientOutcome {
    pub chat_id: ChatId,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

/// Aggregate result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub sent: usize,
    /// One entry per recipient, in list order
    pub outcomes: Vec<RecipientOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            attempted: 0,
            sent: 0,
            outcomes: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn record(&mut self, chat_id: &ChatId, outcome: DispatchOutcome) {
        self.attempted += 1;
        if outcome == DispatchOutcome::Sent {
            self.sent += 1;
        }
        self.outcomes.push(RecipientOutcome {
            chat_id: chat_id.clone(),
            outcome,
        });
    }

    /// Number of recipients that ended with the given outcome kind
    pub fn count(&self, matches: impl Fn(&DispatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| matches(&o.outcome)).count()
    }
}

/// Runs the dispatch loop against one messaging session.
pub struct SafeSender {
    client: Arc<dyn MessagingClient>,
    recipients: RecipientStore,
    content: ContentLoader,
    pacing: Pacing,
}

impl SafeSender {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        recipients: RecipientStore,
        content: ContentLoader,
        pacing: Pacing,
    ) -> Self {
        Self {
            client,
            recipients,
            content,
            pacing,
        }
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Load both inputs from disk and dispatch.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        tracing::info!("Message run started");

        let recipients = self.recipients.load().inspect_err(|e| {
            tracing::error!(error = %e, "Cannot load recipients");
        })?;
        let content = self.content.load().inspect_err(|e| {
            tracing::error!(error = %e, "Cannot load message text");
        })?;

        self.dispatch(&recipients, &content).await
    }

    /// Process `recipients` strictly in order.
    ///
    /// Only a successful send is followed by the cooldown; skips and errors
    /// move straight on to the next recipient.
    pub async fn dispatch(
        &self,
        recipients: &[ChatId],
        content: &MessageContent,
    ) -> Result<RunSummary, RunError> {
        if recipients.is_empty() {
            tracing::warn!("No recipients found");
            return Err(RunError::Precondition(LoadError::Empty {
                path: self.recipients.path().to_path_buf(),
            }));
        }

        let checker = EligibilityChecker::new(self.client.as_ref());
        let dispatcher = Dispatcher::new(self.client.as_ref());
        let mut summary = RunSummary::begin();

        for chat_id in recipients {
            tracing::info!(chat_id = %chat_id, "Checking recipient");

            match checker.check(chat_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(chat_id = %chat_id, "Not on the service, skipped");
                    summary.record(chat_id, DispatchOutcome::SkippedIneligible);
                    continue;
                }
                Err(e) => {
                    tracing::error!(chat_id = %chat_id, error = %e, "Eligibility check failed");
                    summary.record(
                        chat_id,
                        DispatchOutcome::Error {
                            reason: format!("{:#}", e),
                        },
                    );
                    continue;
                }
            }

            tracing::info!(chat_id = %chat_id, "Sending message");
            match dispatcher.send(chat_id, content).await {
                Ok(()) => {
                    summary.record(chat_id, DispatchOutcome::Sent);
                    tracing::info!(chat_id = %chat_id, sent = summary.sent, "Sent");
                    self.pacing.cool_down().await;
                }
                Err(SendFailure::Rejected(reason)) => {
                    tracing::warn!(chat_id = %chat_id, reason = %reason, "Service rejected number, skipped");
                    summary.record(chat_id, DispatchOutcome::SkippedRejected { reason });
                }
                Err(SendFailure::Transient(reason)) => {
                    tracing::error!(chat_id = %chat_id, error = %reason, "Unexpected send error");
                    summary.record(chat_id, DispatchOutcome::Error { reason });
                }
            }
        }

        summary.finished_at = Utc::now();
        tracing::info!(
            sent = summary.sent,
            total = recipients.len(),
            "All messages processed: sent {} / {}",
            summary.sent,
            recipients.len()
        );

        Ok(summary)
    }
}
