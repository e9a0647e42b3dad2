// ABOUTME: Fixed delays that keep the session under the service's abuse thresholds.
// ABOUTME: Cooldown after each send, warm-up after connecting, interval between sweep checks.

use std::time::Duration;

/// Fixed pauses applied by the dispatch loop, the lifecycle driver and the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Pause after every successful send
    pub cooldown: Duration,
    /// Pause between becoming connected and starting a run
    pub warmup: Duration,
    /// Pause after each completed eligibility check during a sweep
    pub check_interval: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(30),
            warmup: Duration::from_secs(20),
            check_interval: Duration::from_secs(5),
        }
    }
}

impl Pacing {
    pub fn from_millis(cooldown_ms: u64, warmup_ms: u64, check_interval_ms: u64) -> Self {
        Self {
            cooldown: Duration::from_millis(cooldown_ms),
            warmup: Duration::from_millis(warmup_ms),
            check_interval: Duration::from_millis(check_interval_ms),
        }
    }

    pub async fn cool_down(&self) {
        pause(self.cooldown).await;
    }

    pub async fn warm_up(&self) {
        pause(self.warmup).await;
    }

    pub async fn between_checks(&self) {
        pause(self.check_interval).await;
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
