//! Truncated exponential backoff
//!
//! Delays grow as `base * 2^attempt` plus up to one `base` of random jitter,
//! capped per attempt and bounded by an overall deadline. Only errors the
//! caller marks as transient are retried.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Outcome of a retried operation that did not succeed
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation failed with an error that is not retried
    Permanent(E),
    /// Transient failures continued until the next delay would cross the deadline
    Exhausted { last: E, attempts: u32, waited: Duration },
}

/// Backoff policy parameterized by deadline, base delay, jitter and cap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    deadline: Duration,
    base: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Backoff {
    /// One-second base, 32-second cap, jitter enabled
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            jitter: true,
        }
    }

    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let mut delay = self.base.saturating_mul(factor);
        if self.jitter {
            delay = delay.saturating_add(self.base.mul_f64(rand::random::<f64>()));
        }
        delay.min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails permanently, or the deadline would be crossed
    pub async fn retry<T, E, F, Fut, P>(&self, mut op: F, is_transient: P) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let mut attempt = 0u32;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) => err,
                Err(err) => return Err(RetryError::Permanent(err)),
            };

            let delay = self.delay_for(attempt);
            if Instant::now() + delay >= deadline {
                return Err(RetryError::Exhausted {
                    last: err,
                    attempts: attempt + 1,
                    waited: started.elapsed(),
                });
            }

            debug!("Transient failure (attempt {}), retrying in {:?}", attempt + 1, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
