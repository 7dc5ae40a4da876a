use std::thread;
use std::time::Duration;

use crate::error::SyncError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Bounded retry with a fixed, blocking delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `op` until it succeeds or `max_attempts` is reached. The closure receives the
    /// 1-based attempt number. Exhaustion yields `FetchExhausted` wrapping the last error.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut(u32) -> Result<T, SyncError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= max_attempts => {
                    return Err(SyncError::FetchExhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    tracing::debug!(attempt, max_attempts, error = %err, "attempt failed, retrying");
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
