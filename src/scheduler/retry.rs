/// Retry policy for device reads
use log::error;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Fixed-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between two attempts
    pub backoff: Duration,
    /// Total number of attempts before giving up; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(DEFAULT_BACKOFF)
    }
}

impl RetryPolicy {
    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            backoff,
            max_attempts: None,
        }
    }

    pub fn bounded(backoff: Duration, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts: Some(max_attempts),
        }
    }

    fn allows_another(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }
}

/// Run `operation` until it succeeds or the policy gives up
///
/// # Arguments
/// * `policy` - Backoff and attempt limit
/// * `what` - Description of the operation for log messages
/// * `operation` - Called with the 1-based attempt number
///
/// # Returns
/// The first successful value, or None once the policy is exhausted
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut operation: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match operation(attempt).await {
            Ok(value) => return Some(value),
            Err(e) => {
                if !policy.allows_another(attempt) {
                    error!("{} failed after {} attempts, giving up: {}", what, attempt, e);
                    return None;
                }
                error!(
                    "Attempt {}: {} failed: {}. Retrying in {} ms",
                    attempt,
                    what,
                    e,
                    policy.backoff.as_millis()
                );
                tokio::time::sleep(policy.backoff).await;
            }
        }
    }
}
