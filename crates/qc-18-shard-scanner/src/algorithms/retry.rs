//! # Iteration Retry
//!
//! Replays a whole master iteration after a retryable failure, with capped
//! exponential backoff.

use crate::config::RetryPolicy;
use crate::domain::ScanError;
use crate::ports::outbound::ScanContext;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Delay before replay number `retry` (0-based): `base * 2^retry`, capped.
pub fn backoff_delay(policy: &RetryPolicy, retry: u32) -> Duration {
    let factor = 1u64 << retry.min(6);
    let delay = policy.base_delay_ms.saturating_mul(factor);
    Duration::from_millis(delay.min(policy.max_delay_ms))
}

/// May an iteration that failed with `err` after `attempts` tries run again?
pub fn should_retry(policy: &RetryPolicy, err: &ScanError, attempts: u32) -> bool {
    err.is_retryable() && attempts < policy.max_attempts
}

/// Value produced by a retried operation, with the number of replays it took.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Retried<T> {
    /// Operation result.
    pub value: T,
    /// Replays after retryable failures.
    pub retries: u32,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are spent.
///
/// `op` must be safe to replay from scratch. Exhausting the attempts on a
/// retryable error yields `RetriesExhausted` when more than one attempt was
/// allowed, the bare error otherwise.
pub async fn retry_iteration<T, F, Fut>(
    ctx: &ScanContext,
    policy: &RetryPolicy,
    seqno: u32,
    mut op: F,
) -> Result<Retried<T>, ScanError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScanError>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    retries: attempts - 1,
                })
            }
            Err(err) if should_retry(policy, &err, attempts) => {
                let delay = backoff_delay(policy, attempts - 1);
                warn!(
                    "[qc-18] Master {} attempt {}/{} failed: {}; replaying in {:?}",
                    seqno, attempts, policy.max_attempts, err, delay
                );
                ctx.sleep(delay).await?;
            }
            Err(err) if err.is_retryable() && policy.max_attempts > 1 => {
                return Err(ScanError::RetriesExhausted {
                    seqno,
                    attempts,
                    last: Box::new(err),
                })
            }
            Err(err) => return Err(err),
        }
    }
}
