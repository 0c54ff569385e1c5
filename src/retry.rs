//! Bounded retry with fixed spacing

use crate::{Error, Result};
use log::warn;
use std::future::Future;
use std::time::Duration;

/// How often, and how far apart, a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,
    /// Fixed wait between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(300),
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the policy
/// is exhausted.
///
/// Non-transient errors are returned as-is on the attempt they occur. When
/// every attempt failed transiently the result is
/// [`Error::CommunicationTimeout`] carrying the last failure's message.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if attempt >= policy.max_retries {
                    return Err(Error::CommunicationTimeout {
                        attempts: attempt + 1,
                        last: err.to_string(),
                    });
                }
                warn!(
                    "attempt {}/{} failed: {}; retrying in {}ms",
                    attempt + 1,
                    policy.attempts(),
                    err,
                    policy.delay.as_millis()
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
