//! Retry helper for transient infrastructure failures
//!
//! Connectivity loss against the source database or the search index must not
//! kill the process: the pipeline waits out the outage with exponential
//! backoff and resumes where it left off. Anything that is not classified as
//! transient propagates immediately.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::Result;

/// Backoff policy for transient-error retries
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }

    /// Delay for the given attempt (1-based), doubling up to the cap
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(factor as u32)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Run `op` until it succeeds or fails with a non-transient error
///
/// Transient failures (see [`EtlError::is_transient`]) are retried without an
/// attempt limit; the process keeps running through arbitrarily long
/// infrastructure outages.
pub async fn retry_transient<T, F, Fut>(policy: RetryPolicy, op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                attempt += 1;
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "{} failed with transient error (attempt {}): {}. Retrying in {:?}",
                    op_name, attempt, e, delay
                );
                tokio::time::sleep(delay).await;
            },
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use std::cell::Cell;

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let policy = RetryPolicy::new(Duration::from_millis(100), Duration::from_millis(450));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(450));
        assert_eq!(policy.delay_for_attempt(20), Duration::from_millis(450));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = Cell::new(0);

        let result = retry_transient(RetryPolicy::default(), "fetch", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(EtlError::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_propagates_immediately() {
        let calls = Cell::new(0);

        let result: Result<()> = retry_transient(RetryPolicy::default(), "load", || {
            calls.set(calls.get() + 1);
            async {
                Err(EtlError::BulkRejected {
                    failed: 1,
                    total: 10,
                })
            }
        })
        .await;

        assert!(matches!(result, Err(EtlError::BulkRejected { .. })));
        assert_eq!(calls.get(), 1);
    }
}
