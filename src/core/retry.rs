use crate::utils::error::Result;
use std::future::Future;
use std::time::Duration;

/// Fixed retry budget with a constant pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Runs `operation` until it succeeds or the budget is spent. The last
    /// error is returned together with the number of attempts made.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match operation().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                    }
                }
                Err(e) if attempts <= self.max_retries => {
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}",
                        label,
                        attempts,
                        self.max_attempts(),
                        e
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(e) => {
                    tracing::error!("{} failed after {} attempts: {}", label, attempts, e);
                    return RetryOutcome {
                        result: Err(e),
                        attempts,
                    };
                }
            }
        }
    }
}
