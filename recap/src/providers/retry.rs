//! Retry logic for provider calls: exponential backoff with jitter, non-retryable
//! short-circuit, Retry-After handling and cancellation.

use crate::failure::Failure;
use crate::types::RetryPolicy;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay after the `attempt`-th failure (1-based), before jitter:
/// `min(max_delay, base_delay * multiplier^(attempt-1))`.
pub fn compute_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let factor = policy.backoff_multiplier.max(1.0).powi(exponent);
    let raw_ms = policy.base_delay_ms as f64 * factor;
    let capped_ms = raw_ms.min(policy.max_delay_ms as f64);
    Duration::from_millis(capped_ms as u64)
}

/// Uniform random extra wait in `[0, fraction * delay]`.
pub fn jitter(delay: Duration, fraction: f64) -> Duration {
    if fraction <= 0.0 || delay.is_zero() {
        return Duration::ZERO;
    }
    let max = delay.as_secs_f64() * fraction.min(1.0);
    Duration::from_secs_f64(rand::rng().random_range(0.0..=max))
}

/// Full wait before the next attempt. A server `retry_after` hint raises the
/// wait, but never beyond `max_delay`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let delay = compute_delay(policy, attempt);
    let wait = delay + jitter(delay, policy.jitter_fraction);
    match retry_after {
        Some(hint) => wait.max(hint.min(policy.max_delay())),
        None => wait,
    }
}

/// Run `operation` until it succeeds, fails non-retryably, or the policy's attempts
/// run out. The closure receives the 1-based attempt number.
///
/// The last failure is returned unchanged. Cancellation is observed before each
/// attempt, during each attempt, and during every backoff sleep, and always
/// yields a `Timeout` failure without sleeping further.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, Failure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Failure>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(Failure::cancelled());
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Failure::cancelled()),
            outcome = operation(attempt) => outcome,
        };
        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_retryable() {
            tracing::debug!(attempt, kind = %err.kind, "not retrying: {}", err);
            return Err(err);
        }
        if attempt >= max_attempts {
            tracing::debug!(attempt, "retry budget exhausted: {}", err);
            return Err(err);
        }

        let wait = backoff_delay(policy, attempt, err.retry_after);
        tracing::warn!(
            attempt,
            max_attempts,
            wait_ms = wait.as_millis() as u64,
            "retrying after {}",
            err
        );

        if cancel.is_cancelled() {
            return Err(Failure::cancelled());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Failure::cancelled()),
            _ = tokio::time::sleep(wait) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 10_000,
            jitter_fraction: 0.0,
        }
    }

    fn fail(kind: FailureKind) -> Failure {
        Failure::new(kind, format!("{}", kind))
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let p = policy(10);
        assert_eq!(compute_delay(&p, 1), Duration::from_millis(1_000));
        assert_eq!(compute_delay(&p, 2), Duration::from_millis(2_000));
        assert_eq!(compute_delay(&p, 3), Duration::from_millis(4_000));
        assert_eq!(compute_delay(&p, 5), Duration::from_millis(10_000));
        assert_eq!(compute_delay(&p, 60), Duration::from_millis(10_000));
    }

    #[test]
    fn jitter_stays_within_fraction() {
        let delay = Duration::from_millis(1_000);
        for _ in 0..100 {
            let j = jitter(delay, 0.25);
            assert!(j <= Duration::from_millis(250));
        }
        assert_eq!(jitter(delay, 0.0), Duration::ZERO);
        assert_eq!(jitter(Duration::ZERO, 0.5), Duration::ZERO);
    }

    #[test]
    fn retry_after_raises_wait_but_respects_cap() {
        let p = policy(3);
        assert_eq!(
            backoff_delay(&p, 1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            backoff_delay(&p, 1, Some(Duration::from_secs(120))),
            Duration::from_secs(10)
        );
        assert_eq!(backoff_delay(&p, 1, Some(Duration::from_millis(10))), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_budget_then_returns_last_failure_verbatim() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let result: Result<(), Failure> =
            execute_with_retry(&policy(3), &CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(Failure::new(FailureKind::RateLimited, format!("attempt {}", attempt))
                        .with_provider("p"))
                }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.kind, FailureKind::RateLimited);
        assert_eq!(err.message, "attempt 3");
        assert_eq!(err.provider_name.as_deref(), Some("p"));
        // 1s + 2s of backoff
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_millis(3_100));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = execute_with_retry(&policy(3), &CancellationToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 1 {
                    Err(fail(FailureKind::NetworkUnreachable))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_rejected_is_never_retried() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let result: Result<(), Failure> =
            execute_with_retry(&policy(5), &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(fail(FailureKind::AuthenticationRejected)) }
            })
            .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::AuthenticationRejected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> =
            execute_with_retry(&policy(5), &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(fail(FailureKind::InvalidConfig)) }
            })
            .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::InvalidConfig);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_stops_promptly() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let counter = calls.clone();
        let result: Result<(), Failure> = execute_with_retry(&policy(5), &cancel, |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(fail(FailureKind::RateLimited)) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
        assert_eq!(err.message, "cancelled");
        // cancelled halfway through the first 1s sleep
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // nothing else gets issued afterwards
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_in_flight_attempt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let result: Result<(), Failure> = execute_with_retry(&policy(3), &cancel, |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn already_cancelled_never_calls() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = execute_with_retry(&policy(3), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_means_one() {
        let calls = AtomicU32::new(0);
        let _: Result<(), Failure> =
            execute_with_retry(&policy(0), &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(fail(FailureKind::Timeout)) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
