//! Retry with exponential backoff.
//!
//! Both the Neo4j connection handshake and statement seeding wait for the
//! database with the same schedule: after the n-th failure sleep
//! `base * factor^n` (2s, 2) and try again. By default there is no cap and no
//! jitter, so an unreachable database is retried forever. Caps are opt-in.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{Error, Result};

/// Backoff schedule and stop conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Multiplied by `factor^n` after the n-th failure
    pub base: Duration,
    pub factor: u32,
    /// Total attempts allowed (first try included)
    pub max_attempts: Option<u32>,
    /// Give up when the next pause would cross this budget
    pub max_elapsed: Option<Duration>,
    /// Upper bound for a single pause
    pub max_delay: Option<Duration>,
    /// Randomize each pause into `[delay/2, delay]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    /// Retry forever: `2 * 2^n` seconds, no jitter.
    pub fn unbounded() -> Self {
        Self {
            base: Duration::from_secs(2),
            factor: 2,
            max_attempts: None,
            max_elapsed: None,
            max_delay: None,
            jitter: false,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = Some(elapsed);
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Pause after the `retries`-th consecutive failure (1-based), before jitter.
    pub fn delay_for(&self, retries: u32) -> Duration {
        let multiplier = self.factor.checked_pow(retries).unwrap_or(u32::MAX);
        let delay = self
            .base
            .checked_mul(multiplier)
            .unwrap_or(Duration::from_secs(u64::MAX));

        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    fn pause_for(&self, retries: u32) -> Duration {
        let delay = self.delay_for(retries);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let half = delay / 2;
        let spread = (delay - half).as_millis().min(u64::MAX as u128) as u64;
        half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    /// Total sleep before success when the first `failures` attempts fail.
    pub fn total_delay(&self, failures: u32) -> Duration {
        (1..=failures).map(|n| self.delay_for(n)).sum()
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// `operation` names the work in logs and in `Error::RetryExhausted`.
pub async fn retry_async<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut retries: u32 = 0;

    loop {
        match op().await {
            Ok(value) => {
                if retries > 0 {
                    info!(operation, retries, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) => {
                warn!(operation, "Received error: {}", err);
                retries += 1;

                if policy.max_attempts.is_some_and(|max| retries >= max) {
                    return Err(exhausted(operation, retries, err));
                }

                let pause = policy.pause_for(retries);
                if let Some(budget) = policy.max_elapsed {
                    let resume_at = started.elapsed().checked_add(pause);
                    if resume_at.map_or(true, |at| at > budget) {
                        return Err(exhausted(operation, retries, err));
                    }
                }

                warn!(
                    operation,
                    attempt = retries,
                    "Trying again in {} seconds...",
                    pause.as_secs_f64()
                );
                tokio::time::sleep(pause).await;
            }
        }
    }
}

fn exhausted(operation: &str, attempts: u32, err: Error) -> Error {
    Error::RetryExhausted {
        operation: operation.to_string(),
        attempts,
        last_error: err.to_string(),
    }
}
