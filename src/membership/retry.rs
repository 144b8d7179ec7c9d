use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounded retry with linearly growing backoff (`unit * attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_unit: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn with_backoff_unit(backoff_unit: Duration) -> Self {
        Self {
            backoff_unit,
            ..Self::default()
        }
    }

    /// Delay slept after the given failed attempt (1-based), before jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }

    /// Runs `op` until it succeeds or the attempt bound is reached.
    /// The last error is returned when every attempt failed, or as soon as `shutdown`
    /// fires during a backoff.
    pub async fn run<T, F, Fut>(&self, shutdown: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::debug!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    // Up to 50 ms of jitter on top of the linear backoff
                    let jitter = Duration::from_millis(rand::random::<u64>() % 50);
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            tracing::debug!("Retry abandoned on shutdown after attempt {}", attempt);
                            return Err(e);
                        }
                        _ = tokio::time::sleep(self.backoff(attempt) + jitter) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}
