// ABOUTME: Entry point: starts the session bridge, HTTP surface and lifecycle-gated send run
// ABOUTME: `check` subcommand runs the standalone eligibility sweep instead

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use safe_sender::{
    bridge::BridgeClient,
    config::Config,
    logging, server,
};
use sender_core::{
    lifecycle::wait_for_ready, recipients::write_reachable, ContentLoader, EligibilityChecker,
    LifecycleDriver, MessagingClient, RecipientStore, SafeSender,
};
use std::path::Path;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "safe-sender", version, about = "Paced message sender for a paired messaging session")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the status endpoint and send once the session is ready (default)
    Run,
    /// Check which numbers are reachable and write them to the output file
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::install_panic_hook();
    dotenvy::dotenv().ok();
    let _log_guard = logging::init()?;

    let cli = Cli::parse();
    let config = Config::load()?;

    tracing::info!(
        recipients = %config.files.recipients,
        message = %config.files.message,
        cooldown_ms = config.pacing.cooldown_ms,
        warmup_ms = config.pacing.warmup_ms,
        session = %config.bridge.session,
        "Configuration loaded"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_start(config).await,
        Commands::Check => run_check(config).await,
    }
}

async fn run_start(config: Config) -> Result<()> {
    let session: Arc<dyn MessagingClient> = Arc::new(
        BridgeClient::spawn(&config.bridge)
            .await
            .context("Messaging session init failed")?,
    );

    let sender = Arc::new(SafeSender::new(
        Arc::clone(&session),
        RecipientStore::new(&config.files.recipients),
        ContentLoader::new(&config.files.message),
        config.pacing(),
    ));
    let driver = LifecycleDriver::new(Arc::clone(&session), sender);

    let status = driver.subscribe();
    let host = config.server.host.clone();
    let port = config.server.port;
    tokio::spawn(async move {
        if let Err(e) = server::start_server(&host, port, status).await {
            tracing::error!(error = %e, "HTTP server failed");
        }
    });

    tokio::select! {
        result = driver.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Session driver failed");
            }
            tracing::warn!(
                command = %config.bridge.command,
                "Messaging session ended; check that the bridge command runs a compatible sidecar"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    session.shutdown().await
}

async fn run_check(config: Config) -> Result<()> {
    let recipients = RecipientStore::new(&config.files.check_input).load()?;
    tracing::info!(count = recipients.len(), "Checking numbers");

    let client = BridgeClient::spawn(&config.bridge)
        .await
        .context("Messaging session init failed")?;

    let outcome = async {
        wait_for_ready(&client).await?;
        let report = EligibilityChecker::new(&client)
            .sweep(&recipients, &config.pacing())
            .await;

        write_reachable(Path::new(&config.files.check_output), &report.reachable)?;
        tracing::info!(
            reachable = report.reachable.len(),
            total = report.total(),
            path = %config.files.check_output,
            "Reachable list saved"
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;

    client.shutdown().await?;
    outcome
}
