// ABOUTME: Asks the messaging session whether recipients can receive messages.
// ABOUTME: Also implements the standalone sweep that filters a list down to reachable numbers.

use anyhow::Result;

use crate::pacing::Pacing;
use crate::recipients::ChatId;
use crate::traits::MessagingClient;

pub struct EligibilityChecker<'a> {
    client: &'a dyn MessagingClient,
}

/// Result of checking a whole list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Reachable recipients, in input order
    pub reachable: Vec<ChatId>,
    pub unreachable: usize,
    pub errors: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.reachable.len() + self.unreachable + self.errors
    }
}

impl<'a> EligibilityChecker<'a> {
    pub fn new(client: &'a dyn MessagingClient) -> Self {
        Self { client }
    }

    /// Single check; transport errors are returned, never retried here
    pub async fn check(&self, chat_id: &ChatId) -> Result<bool> {
        let status = self.client.check_status(chat_id).await?;
        Ok(status.can_receive_message)
    }

    /// Check every recipient in order, pausing after each completed check.
    ///
    /// Errored checks are logged, excluded from the result, and not followed
    /// by a pause.
    pub async fn sweep(&self, recipients: &[ChatId], pacing: &Pacing) -> SweepReport {
        let mut report = SweepReport::default();

        for chat_id in recipients {
            match self.check(chat_id).await {
                Ok(true) => {
                    tracing::info!(chat_id = %chat_id, "Reachable");
                    report.reachable.push(chat_id.clone());
                }
                Ok(false) => {
                    tracing::info!(chat_id = %chat_id, "Not reachable");
                    report.unreachable += 1;
                }
                Err(e) => {
                    tracing::warn!(chat_id = %chat_id, error = %e, "Error checking number");
                    report.errors += 1;
                    continue;
                }
            }
            pacing.between_checks().await;
        }

        tracing::info!(
            reachable = report.reachable.len(),
            unreachable = report.unreachable,
            errors = report.errors,
            "Eligibility sweep finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockClient;
    use std::time::Duration;

    fn ids(numbers: &[&str]) -> Vec<ChatId> {
        numbers.iter().map(|n| ChatId::parse(n).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_check_reports_reachability() {
        let client = MockClient::new().reachable(&["111"]);
        let checker = EligibilityChecker::new(&client);
        assert!(checker.check(&ChatId::parse("111").unwrap()).await.unwrap());
        assert!(!checker.check(&ChatId::parse("222").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_propagates_transport_error() {
        let client = MockClient::new().check_fails("111", "socket closed");
        let checker = EligibilityChecker::new(&client);
        let err = checker
            .check(&ChatId::parse("111").unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("socket closed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_order_and_skips_errors() {
        let client = MockClient::new()
            .reachable(&["444", "111", "333"])
            .check_fails("333", "timeout");
        let checker = EligibilityChecker::new(&client);
        let pacing = Pacing::from_millis(0, 0, 5_000);

        let start = tokio::time::Instant::now();
        let report = checker
            .sweep(&ids(&["444", "222", "333", "111"]), &pacing)
            .await;

        assert_eq!(report.reachable, ids(&["444", "111"]));
        assert_eq!(report.unreachable, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.total(), 4);

        // Three completed checks, each followed by a pause; the errored one is not
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(15_000));
        assert!(elapsed < Duration::from_millis(20_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_is_idempotent() {
        let client = MockClient::new().reachable(&["222", "111"]);
        let checker = EligibilityChecker::new(&client);
        let pacing = Pacing::from_millis(0, 0, 10);
        let list = ids(&["111", "555", "222"]);

        let first = checker.sweep(&list, &pacing).await;
        let second = checker.sweep(&list, &pacing).await;

        assert_eq!(first, second);
        assert_eq!(first.reachable, ids(&["111", "222"]));
    }
}
