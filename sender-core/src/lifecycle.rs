// ABOUTME: Session lifecycle state machine and the driver that gates dispatch runs on it.
// ABOUTME: Owns the one-shot run guard so a repeated "connected" event never double-sends.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use crate::dispatch::{RunSummary, SafeSender};
use crate::error::RunError;
use crate::traits::{ConnectionState, MessagingClient};

/// What the driver should do after a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Wait for warm-up, then run the dispatch loop
    StartRun,
    /// Take the session over from the other client
    ClaimSession,
    Ignore,
}

/// Transition table over connection states plus the run guard.
///
/// | state      | guard | action       | guard after |
/// |------------|-------|--------------|-------------|
/// | Connected  | false | StartRun     | true        |
/// | Connected  | true  | Ignore       | true        |
/// | Conflicted | any   | ClaimSession | unchanged   |
/// | Unpaired   | any   | Ignore       | false       |
/// | other      | any   | Ignore       | unchanged   |
#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    state: ConnectionState,
    has_run: bool,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            has_run: false,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn has_run(&self) -> bool {
        self.has_run
    }

    pub fn apply(&mut self, state: ConnectionState) -> LifecycleAction {
        let action = match &state {
            ConnectionState::Connected if !self.has_run => {
                self.has_run = true;
                LifecycleAction::StartRun
            }
            ConnectionState::Conflicted => LifecycleAction::ClaimSession,
            ConnectionState::Unpaired => {
                self.has_run = false;
                LifecycleAction::Ignore
            }
            _ => LifecycleAction::Ignore,
        };
        self.state = state;
        action
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot published for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub has_run: bool,
    pub running: bool,
    pub runs_started: u32,
    pub last_summary: Option<RunSummary>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Connecting,
            has_run: false,
            running: false,
            runs_started: 0,
            last_summary: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Feeds session state changes through `SessionLifecycle` one at a time and
/// carries out the resulting actions.
///
/// Runs are spawned so conflict handling keeps working while a run is in
/// flight, but they are serialized behind `run_lock`: a run triggered after
/// a re-pair waits for the previous one to finish.
pub struct LifecycleDriver {
    client: Arc<dyn MessagingClient>,
    sender: Arc<SafeSender>,
    status: Arc<watch::Sender<SessionStatus>>,
    run_lock: Arc<Mutex<()>>,
}

impl LifecycleDriver {
    pub fn new(client: Arc<dyn MessagingClient>, sender: Arc<SafeSender>) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            client,
            sender,
            status: Arc::new(status),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Process state changes until the session's state stream ends, then wait
    /// for any spawned runs to complete.
    pub async fn run(&self) -> Result<()> {
        let mut states = self.client.state_stream().await?;
        let mut lifecycle = SessionLifecycle::new();
        let mut runs: Vec<JoinHandle<()>> = Vec::new();

        while let Some(state) = states.next().await {
            tracing::info!(state = %state, "Session state changed");
            let action = lifecycle.apply(state.clone());

            self.status.send_modify(|s| {
                s.state = state;
                s.has_run = lifecycle.has_run();
                if action == LifecycleAction::StartRun {
                    s.runs_started += 1;
                }
                s.updated_at = Utc::now();
            });

            match action {
                LifecycleAction::StartRun => {
                    tracing::info!("Session ready, scheduling message run");
                    runs.retain(|h| !h.is_finished());
                    runs.push(self.spawn_run());
                }
                LifecycleAction::ClaimSession => {
                    tracing::warn!("Session conflict detected, claiming session here");
                    if let Err(e) = self.client.claim_session().await {
                        tracing::error!(error = %e, "Failed to claim session");
                    }
                }
                LifecycleAction::Ignore => {
                    if lifecycle.state() == &ConnectionState::Unpaired {
                        tracing::warn!("Session unpaired, QR scan required again");
                    }
                }
            }
        }

        tracing::info!("Session state stream ended");
        for handle in runs {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Run task failed to join");
            }
        }
        Ok(())
    }

    fn spawn_run(&self) -> JoinHandle<()> {
        let sender = Arc::clone(&self.sender);
        let status = Arc::clone(&self.status);
        let lock = Arc::clone(&self.run_lock);

        tokio::spawn(async move {
            let _guard = lock.lock_owned().await;

            tracing::info!(
                warmup_ms = sender.pacing().warmup.as_millis() as u64,
                "Waiting before sending"
            );
            sender.pacing().warm_up().await;

            status.send_modify(|s| {
                s.running = true;
                s.updated_at = Utc::now();
            });

            // A panic inside the loop is outside the per-recipient scope: surface it
            let inner = Arc::clone(&sender);
            let result = match tokio::spawn(async move { inner.run().await }).await {
                Ok(result) => result,
                Err(e) => Err(RunError::Fatal(e.to_string())),
            };

            match &result {
                Ok(summary) => {
                    tracing::info!(sent = summary.sent, attempted = summary.attempted, "Run finished")
                }
                Err(e) => tracing::error!(error = %e, "Run aborted"),
            }

            status.send_modify(|s| {
                s.running = false;
                match result {
                    Ok(summary) => {
                        s.last_summary = Some(summary);
                        s.last_error = None;
                    }
                    Err(e) => s.last_error = Some(e.to_string()),
                }
                s.updated_at = Utc::now();
            });
        })
    }
}

/// Consume state changes until the session is connected, claiming it on conflict.
///
/// Used by one-shot commands that need a ready session but no run guard.
pub async fn wait_for_ready(client: &dyn MessagingClient) -> Result<()> {
    let mut states = client.state_stream().await?;
    while let Some(state) = states.next().await {
        tracing::info!(state = %state, "Session state changed");
        if state.is_ready() {
            return Ok(());
        }
        match state {
            ConnectionState::Conflicted => client.claim_session().await?,
            ConnectionState::Unpaired => {
                tracing::warn!("Session unpaired, QR scan required again")
            }
            _ => {}
        }
    }
    anyhow::bail!("Session closed before it became ready")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_first_connect_starts_run() {
        let mut lifecycle = SessionLifecycle::new();
        assert!(!lifecycle.has_run());
        assert_eq!(lifecycle.apply(Connected), LifecycleAction::StartRun);
        assert!(lifecycle.has_run());
    }

    #[test]
    fn test_repeated_connect_is_ignored() {
        let mut lifecycle = SessionLifecycle::new();
        lifecycle.apply(Connected);
        assert_eq!(lifecycle.apply(Connected), LifecycleAction::Ignore);
        assert!(lifecycle.has_run());
    }

    #[test]
    fn test_unpair_resets_guard() {
        let events = [Connected, Connected, Unpaired, Connected];
        let mut lifecycle = SessionLifecycle::new();
        let starts = events
            .into_iter()
            .map(|e| lifecycle.apply(e))
            .filter(|a| *a == LifecycleAction::StartRun)
            .count();
        assert_eq!(starts, 2);
    }

    #[test]
    fn test_conflict_claims_without_touching_guard() {
        let mut lifecycle = SessionLifecycle::new();
        lifecycle.apply(Connected);
        assert_eq!(lifecycle.apply(Conflicted), LifecycleAction::ClaimSession);
        assert!(lifecycle.has_run());
        assert_eq!(lifecycle.apply(Connected), LifecycleAction::Ignore);
    }

    #[test]
    fn test_other_states_only_update_state() {
        let mut lifecycle = SessionLifecycle::new();
        assert_eq!(
            lifecycle.apply(Other("TIMEOUT".to_string())),
            LifecycleAction::Ignore
        );
        assert_eq!(lifecycle.state(), &Other("TIMEOUT".to_string()));
        assert!(!lifecycle.has_run());
    }
}
