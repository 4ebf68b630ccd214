//! Retry utilities with exponential backoff and jitter.
//!
//! A public utility module for integrators building `Provider` adapters.
//! The execution loop itself does not retry: provider errors abort the
//! current turn and surface to the caller. An adapter that wants
//! retry-before-surfacing wraps its own transport calls with
//! [`retry_with_backoff`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Backoff policy for [`retry_with_backoff`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter fraction in `[0.0, 1.0]`, applied as `delay * (1 +/- jitter)`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// The delay before attempt `attempt` (0-indexed), exponential in
    /// `attempt` and capped at `max_delay`, with jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp_ms = (self.base_delay.as_millis() as f64) * 2f64.powi(attempt as i32);
        let capped_ms = exp_ms.min(self.max_delay.as_millis() as f64);

        let mut rng = rand::thread_rng();
        let jitter_factor = 1.0 + rng.gen_range(-self.jitter..=self.jitter);
        let jittered_ms = (capped_ms * jitter_factor).max(0.0);
        Duration::from_millis(jittered_ms as u64)
    }
}

/// Retry `operation` up to `policy.max_attempts` times, sleeping with
/// exponential backoff and jitter between attempts. Returns the first
/// success, or the last error if every attempt fails.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_err = None;
    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_err = Some(err);
                if attempt + 1 < policy.max_attempts {
                    tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                }
            }
        }
    }
    Err(last_err.expect("at least one attempt always runs"))
}
