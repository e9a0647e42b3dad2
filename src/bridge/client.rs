// ABOUTME: BridgeClient spawns the session sidecar and implements MessagingClient over its stdio.
// ABOUTME: Matches responses to requests by id and turns state events into a ConnectionState stream.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sender_core::config::BridgeConfig;
use sender_core::{ChatId, ConnectionState, MessagingClient, NumberStatus, StateStream};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::protocol::{
    BridgeEvent, BridgeMessage, BridgeRequest, METHOD_CHECK_STATUS, METHOD_CLOSE, METHOD_SEND_TEXT,
    METHOD_USE_HERE,
};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

pub struct BridgeClient {
    line_tx: mpsc::Sender<String>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    states_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnectionState>>>,
    child: tokio::sync::Mutex<Child>,
    request_timeout: Duration,
}

impl BridgeClient {
    /// Spawn the sidecar and start the stdio pump tasks
    pub async fn spawn(config: &BridgeConfig) -> Result<Self> {
        if config.command.contains('\0') {
            anyhow::bail!("Invalid bridge command");
        }

        tracing::info!(
            command = %config.command,
            args = ?config.args,
            session = %config.session,
            headless = config.headless,
            "Spawning messaging bridge"
        );

        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .arg("--session")
            .arg(&config.session);
        if config.headless {
            command.arg("--headless");
        }

        let mut child = command
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn bridge '{}'", config.command))?;

        let mut stdin = child.stdin.take().context("Failed to get stdin")?;
        let stdout = child.stdout.take().context("Failed to get stdout")?;
        let stderr = child.stderr.take().context("Failed to get stderr")?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (states_tx, states_rx) = mpsc::unbounded_channel();
        let (line_tx, mut line_rx) = mpsc::channel::<String>(32);

        // Writer: serialize all requests through one task
        tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    tracing::error!(error = %e, "Failed to write to bridge");
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!(error = %e, "Failed to flush bridge stdin");
                    break;
                }
            }
        });

        tokio::spawn(read_stdout(
            stdout,
            Arc::clone(&pending),
            Arc::clone(&closed),
            states_tx,
        ));

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.is_empty() {
                    tracing::warn!(stderr = %line, "Bridge stderr");
                }
            }
        });

        Ok(Self {
            line_tx,
            pending,
            closed,
            next_id: AtomicU64::new(1),
            states_rx: Mutex::new(Some(states_rx)),
            child: tokio::sync::Mutex::new(child),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = BridgeRequest { id, method, params }.to_line()?;

        let (reply_tx, reply_rx) = oneshot::channel();
        lock_pending(&self.pending).insert(id, reply_tx);
        // The reader flags closed before failing pending requests, so checking
        // after insertion cannot miss both
        if self.closed.load(Ordering::SeqCst) {
            lock_pending(&self.pending).remove(&id);
            anyhow::bail!("Bridge exited");
        }

        tracing::debug!(id, method, "Bridge request");
        if self.line_tx.send(line).await.is_err() {
            lock_pending(&self.pending).remove(&id);
            anyhow::bail!("Bridge writer closed");
        }

        match tokio::time::timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => anyhow::bail!("Bridge dropped reply for {}", method),
            Err(_) => {
                lock_pending(&self.pending).remove(&id);
                anyhow::bail!(
                    "Bridge request {} timed out after {}s",
                    method,
                    self.request_timeout.as_secs()
                )
            }
        }
    }
}

fn lock_pending(
    pending: &PendingMap,
) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Value>>>> {
    // A poisoned map still holds valid senders
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

async fn read_stdout(
    stdout: ChildStdout,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    states_tx: mpsc::UnboundedSender<ConnectionState>,
) {
    let mut lines = BufReader::new(stdout).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }

        match BridgeMessage::parse(&line) {
            Ok(BridgeMessage::Response { id, result, error }) => {
                let reply = match error {
                    Some(e) => Err(anyhow::anyhow!(e.message)),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                let waiter = lock_pending(&pending).remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => tracing::warn!(id, "Bridge response for unknown request"),
                }
            }
            Ok(BridgeMessage::Event(BridgeEvent::State { state })) => {
                let _ = states_tx.send(ConnectionState::from_label(&state));
            }
            Ok(BridgeMessage::Event(BridgeEvent::Qr { ascii })) => {
                tracing::info!("Scan QR code:\n{}", ascii);
            }
            Ok(BridgeMessage::Event(BridgeEvent::Status { status })) => {
                tracing::info!(status = %status, "Session status");
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring bridge output"),
        }
    }

    tracing::warn!("Bridge stdout closed");
    closed.store(true, Ordering::SeqCst);
    let orphans: Vec<_> = lock_pending(&pending).drain().collect();
    for (_, tx) in orphans {
        let _ = tx.send(Err(anyhow::anyhow!("Bridge exited")));
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    async fn state_stream(&self) -> Result<StateStream> {
        let rx = self
            .states_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .context("State stream already taken")?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn check_status(&self, chat_id: &ChatId) -> Result<NumberStatus> {
        let value = self
            .request(METHOD_CHECK_STATUS, json!({ "chatId": chat_id.as_str() }))
            .await?;
        // A null status means the service has nothing on this number
        if value.is_null() {
            return Ok(NumberStatus {
                can_receive_message: false,
            });
        }
        serde_json::from_value(value).context("Malformed number status from bridge")
    }

    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()> {
        self.request(
            METHOD_SEND_TEXT,
            json!({ "chatId": chat_id.as_str(), "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn claim_session(&self) -> Result<()> {
        self.request(METHOD_USE_HERE, json!({})).await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Err(e) = self.request(METHOD_CLOSE, json!({})).await {
            tracing::debug!(error = %e, "Bridge close request failed");
        }
        let mut child = self.child.lock().await;
        if let Err(e) = child.kill().await {
            tracing::debug!(error = %e, "Bridge already exited");
        }
        Ok(())
    }
}
