use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::error::ScrapeError;
use crate::settings::duration_millis;

// Constants for session retry behavior
pub const MAX_ATTEMPTS: u32 = 3;                                // Whole-session attempts
pub const BASE_DELAY: Duration = Duration::from_secs(2);        // Delay before the 2nd attempt
pub const BACKOFF_MULTIPLIER: u32 = 2;                          // Growth per further attempt

/// Bounded retries with exponential backoff for whole scraping sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: u32) -> Self {
        Self { max_attempts, base_delay, multiplier }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Runs `operation` until it succeeds or the policy's attempts are used up.
///
/// `operation` receives the 1-based attempt number and must build a fresh
/// session each time. The last error is returned on exhaustion.
pub async fn run_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, ScrapeError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ScrapeError>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        debug!("{}: attempt {}/{}", label, attempt, attempts);
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                error!("{}: giving up after {} attempts: {}", label, attempts, e);
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "{}: attempt {}/{} failed: {}; retrying in {:?}",
                    label, attempt, attempts, e, delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
