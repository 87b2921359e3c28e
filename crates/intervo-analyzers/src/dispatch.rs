// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry and circuit-breaker dispatch wrapper around raw analyzer calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::error::{AnalyzerError, AnalyzerResult};

/// Upper bound applied to server-provided `Retry-After` hints.
const RETRY_AFTER_CAP: Duration = Duration::from_secs(30);

/// Backoff schedule for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), with ±20% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis() as u64 * u64::from(self.factor.pow(attempt));
        let jitter = rand::thread_rng().gen_range(0.8..=1.2);
        Duration::from_millis((exp as f64 * jitter) as u64)
    }

    /// A near-zero-delay policy for tests.
    pub fn immediate() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            factor: 1,
        }
    }
}

/// Successful dispatch with the number of retries it took.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub result: AnalyzerResult,
    /// Zero means first-attempt success; anything more marks the result
    /// degraded.
    pub retries: u32,
}

/// Wraps raw calls with the breaker gate and the retry schedule.
#[derive(Clone)]
pub struct Dispatcher {
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Self {
        Self { breaker, policy }
    }

    /// The shared breaker for this analyzer.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `op` with fail-fast on an open circuit, retrying transient and
    /// rate-limited failures up to the policy budget.
    pub async fn run<F, Fut>(&self, op: F) -> Result<DispatchOutcome, AnalyzerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<AnalyzerResult, AnalyzerError>>,
    {
        let mut attempt = 0;
        loop {
            if !self.breaker.try_acquire() {
                return Err(AnalyzerError::Transient(
                    "circuit open, failing fast".to_string(),
                ));
            }

            match op().await {
                Ok(result) => {
                    self.breaker.record_success();
                    return Ok(DispatchOutcome {
                        result,
                        retries: attempt,
                    });
                }
                Err(err) => {
                    self.breaker.record_failure();
                    let delay = match &err {
                        AnalyzerError::Transient(_) if attempt < self.policy.max_retries => {
                            Some(self.policy.delay(attempt))
                        }
                        AnalyzerError::RateLimited { retry_after }
                            if attempt < self.policy.max_retries =>
                        {
                            Some(
                                retry_after
                                    .unwrap_or_else(|| self.policy.delay(attempt))
                                    .min(RETRY_AFTER_CAP),
                            )
                        }
                        _ => None,
                    };

                    match delay {
                        Some(delay) => {
                            debug!(attempt, ?delay, error = %err, "retrying analyzer call");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => {
                            warn!(attempt, error = %err, "analyzer call exhausted");
                            return Err(err);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ok_result() -> AnalyzerResult {
        AnalyzerResult {
            score: 80,
            detail: serde_json::json!({}),
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(CircuitBreaker::new("test")),
            RetryPolicy::immediate(),
        )
    }

    #[tokio::test]
    async fn first_attempt_success_has_no_retries() {
        let outcome = dispatcher().run(|| async { Ok(ok_result()) }).await.unwrap();
        assert_eq!(outcome.retries, 0);
        assert_eq!(outcome.result.score, 80);
    }

    #[tokio::test]
    async fn transient_failures_retry_then_succeed() {
        let calls = AtomicU32::new(0);
        let outcome = dispatcher()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AnalyzerError::Transient("503".into()))
                    } else {
                        Ok(ok_result())
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(outcome.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_exhausts_after_two_retries() {
        let calls = AtomicU32::new(0);
        let err = dispatcher()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<AnalyzerResult, _>(AnalyzerError::Transient("503".into())) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Transient(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "initial + 2 retries");
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = dispatcher()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<AnalyzerResult, _>(AnalyzerError::Permanent("400".into())) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Permanent(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limited_honors_small_retry_after() {
        let calls = AtomicU32::new(0);
        let outcome = dispatcher()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(AnalyzerError::RateLimited {
                            retry_after: Some(Duration::from_millis(1)),
                        })
                    } else {
                        Ok(ok_result())
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(outcome.retries, 1);
    }

    #[tokio::test]
    async fn open_breaker_fails_fast_without_calling() {
        let breaker = Arc::new(CircuitBreaker::new("test"));
        for _ in 0..5 {
            breaker.record_failure();
        }
        let dispatcher = Dispatcher::new(breaker, RetryPolicy::immediate());

        let calls = AtomicU32::new(0);
        let err = dispatcher
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ok_result()) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Transient(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no network while open");
    }

    #[test]
    fn backoff_grows_with_attempts_within_jitter() {
        let policy = RetryPolicy::default();
        let first = policy.delay(0);
        let second = policy.delay(1);
        assert!(first >= Duration::from_millis(400) && first <= Duration::from_millis(600));
        assert!(second >= Duration::from_millis(800) && second <= Duration::from_millis(1200));
    }
}
