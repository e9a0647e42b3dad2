// ABOUTME: Tests for the lifecycle driver gating send runs on session state changes.
// ABOUTME: Uses the scripted MockClient and paused tokio time for warm-up delays.

use std::sync::Arc;
use std::time::Duration;

use safe_sender::testing::MockClient;
use sender_core::lifecycle::wait_for_ready;
use sender_core::{
    ConnectionState, ContentLoader, LifecycleDriver, MessagingClient, Pacing, RecipientStore,
    SafeSender,
};
use tempfile::TempDir;
use tokio::time::Instant;

use ConnectionState::*;

const WARMUP: Duration = Duration::from_secs(20);

fn driver_for(client: &Arc<MockClient>, numbers_json: &str) -> (TempDir, LifecycleDriver) {
    let dir = TempDir::new().unwrap();
    let numbers = dir.path().join("whatsapp_numbers.json");
    let text = dir.path().join("first.txt");
    std::fs::write(&numbers, numbers_json).unwrap();
    std::fs::write(&text, "Hello").unwrap();

    let pacing = Pacing {
        cooldown: Duration::from_secs(30),
        warmup: WARMUP,
        check_interval: Duration::ZERO,
    };
    let sender = Arc::new(SafeSender::new(
        client.clone(),
        RecipientStore::new(numbers),
        ContentLoader::new(text),
        pacing,
    ));
    (dir, LifecycleDriver::new(client.clone(), sender))
}

fn script(client: &MockClient, states: &[ConnectionState]) {
    for state in states {
        client.emit(state.clone());
    }
    client.close_states();
}

#[tokio::test(start_paused = true)]
async fn test_repeated_connected_starts_a_single_run() {
    let client = Arc::new(MockClient::new().reachable(&["111", "222"]));
    let (_dir, driver) = driver_for(&client, r#"["111", "222"]"#);
    let status = driver.subscribe();
    script(&client, &[Connecting, Connected, Connected, Connected]);

    driver.run().await.unwrap();

    assert_eq!(client.checked(), vec!["111@c.us", "222@c.us"]);
    assert_eq!(client.sent_to().len(), 2);
    let snapshot = status.borrow().clone();
    assert_eq!(snapshot.runs_started, 1);
    assert!(snapshot.has_run);
    assert!(!snapshot.running);
}

#[tokio::test(start_paused = true)]
async fn test_re_pair_allows_exactly_one_more_run() {
    let client = Arc::new(MockClient::new().reachable(&["111", "222"]));
    let (_dir, driver) = driver_for(&client, r#"["111", "222"]"#);
    let status = driver.subscribe();
    script(&client, &[Connected, Connected, Unpaired, Connected]);

    driver.run().await.unwrap();

    // Runs never interleave: the second waits for the first to finish
    assert_eq!(
        client.checked(),
        vec!["111@c.us", "222@c.us", "111@c.us", "222@c.us"]
    );
    assert_eq!(status.borrow().runs_started, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unpaired_then_closed_does_not_run() {
    let client = Arc::new(MockClient::new().reachable(&["111"]));
    let (_dir, driver) = driver_for(&client, r#"["111"]"#);
    let status = driver.subscribe();
    script(&client, &[Connecting, Unpaired]);

    driver.run().await.unwrap();

    assert!(client.calls().is_empty());
    let snapshot = status.borrow().clone();
    assert_eq!(snapshot.runs_started, 0);
    assert_eq!(snapshot.state, Unpaired);
}

#[tokio::test(start_paused = true)]
async fn test_conflict_claims_session_without_starting_run() {
    let client = Arc::new(MockClient::new().reachable(&["111"]));
    let (_dir, driver) = driver_for(&client, r#"["111"]"#);
    script(&client, &[Connecting, Conflicted]);

    driver.run().await.unwrap();

    assert_eq!(client.claims(), 1);
    assert!(client.checked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_waits_for_warmup() {
    let client = Arc::new(MockClient::new().reachable(&["111"]));
    let (_dir, driver) = driver_for(&client, r#"["111"]"#);
    script(&client, &[Connected]);

    let start = Instant::now();
    driver.run().await.unwrap();

    let first_check = client.calls()[0].at;
    assert!(first_check - start >= WARMUP);
    assert!(first_check - start < WARMUP + Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_status_carries_last_summary() {
    let client = Arc::new(MockClient::new().reachable(&["111"]));
    let (_dir, driver) = driver_for(&client, r#"["111", "222"]"#);
    let status = driver.subscribe();
    script(&client, &[Connected]);

    driver.run().await.unwrap();

    let snapshot = status.borrow().clone();
    let summary = snapshot.last_summary.expect("summary recorded");
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.sent, 1);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_precondition_failure_is_reported_in_status() {
    let client = Arc::new(MockClient::new().reachable(&["111"]));
    let (_dir, driver) = driver_for(&client, "[]");
    let status = driver.subscribe();
    script(&client, &[Connected]);

    driver.run().await.unwrap();

    assert!(client.calls().is_empty());
    let snapshot = status.borrow().clone();
    assert!(snapshot.last_summary.is_none());
    assert!(snapshot.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_run_is_reported_as_aborted() {
    let client = Arc::new(MockClient::new().reachable(&["111"]).check_panics("222"));
    let (_dir, driver) = driver_for(&client, r#"["111", "222", "333"]"#);
    let status = driver.subscribe();
    script(&client, &[Connected]);

    driver.run().await.unwrap();

    let snapshot = status.borrow().clone();
    let error = snapshot.last_error.expect("error recorded");
    assert!(error.starts_with("run aborted"), "got: {}", error);
    assert!(!snapshot.running);
    assert!(snapshot.last_summary.is_none());
    assert_eq!(snapshot.runs_started, 1);
    // The loop stops at the panic; later recipients are never checked
    assert_eq!(client.checked(), vec!["111@c.us", "222@c.us"]);
}

#[tokio::test]
async fn test_wait_for_ready_claims_on_conflict() {
    let client = MockClient::new();
    script(&client, &[Connecting, Conflicted, Connected, Unpaired]);

    wait_for_ready(&client).await.unwrap();

    assert_eq!(client.claims(), 1);
}

#[tokio::test]
async fn test_wait_for_ready_fails_when_session_closes() {
    let client = MockClient::new();
    script(&client, &[Connecting, Unpaired]);

    assert!(wait_for_ready(&client).await.is_err());
}

#[tokio::test]
async fn test_state_stream_is_single_consumer() {
    let client = MockClient::new();
    client.close_states();
    let _stream = client.state_stream().await.unwrap();
    assert!(client.state_stream().await.is_err());
}
