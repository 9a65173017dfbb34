//! Circuit breaker guarding the refresh path.
//!
//! The check-decide-update sequence runs under one short mutex section on each
//! side of the call; the wrapped operation itself runs with no lock held.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::error::HookgateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitConfig {
    /// Consecutive failures in Closed before opening
    pub failure_threshold: u32,
    /// Consecutive successes in HalfOpen before closing
    pub success_threshold: u32,
    /// How long Open rejects calls before probing
    pub open_timeout: Duration,
}

impl CircuitConfig {
    pub fn validate(&self) -> Result<(), HookgateError> {
        if self.failure_threshold == 0 {
            return Err(HookgateError::Config(
                "circuit_breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.success_threshold == 0 {
            return Err(HookgateError::Config(
                "circuit_breaker.success_threshold must be at least 1".into(),
            ));
        }
        if self.open_timeout.is_zero() {
            return Err(HookgateError::Config(
                "circuit_breaker.open_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum CircuitError<E> {
    #[error("circuit open, retry after {retry_after:?}")]
    Open { retry_after: Duration },
    #[error("{0}")]
    Inner(E),
}

/// Point-in-time view for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub seconds_since_last_failure: Option<f64>,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout_secs: f64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    open_since: Option<Instant>,
    last_failure: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Result<Self, HookgateError> {
        config.validate()?;
        Ok(Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                open_since: None,
                last_failure: None,
            }),
        })
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Run `operation` unless the circuit is open
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }

        result.map_err(CircuitError::Inner)
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            seconds_since_last_failure: inner.last_failure.map(|at| at.elapsed().as_secs_f64()),
            failure_threshold: self.config.failure_threshold,
            success_threshold: self.config.success_threshold,
            open_timeout_secs: self.config.open_timeout.as_secs_f64(),
        }
    }

    /// Force the breaker back to Closed with cleared counters
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(from = %inner.state, "circuit breaker reset to closed");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.open_since = None;
    }

    fn admit<E>(&self) -> Result<(), CircuitError<E>> {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let opened = inner.open_since.unwrap_or_else(Instant::now);
        let elapsed = opened.elapsed();
        if elapsed < self.config.open_timeout {
            return Err(CircuitError::Open {
                retry_after: self.config.open_timeout - elapsed,
            });
        }

        tracing::info!("circuit breaker half-open, probing");
        inner.state = CircuitState::HalfOpen;
        inner.success_count = 0;
        Ok(())
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    tracing::info!(successes = inner.success_count, "circuit breaker closed");
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.open_since = None;
                }
            }
            // A call admitted before the circuit opened; it does not close it
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.last_failure = Some(now);
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.failure_count,
                        open_for = ?self.config.open_timeout,
                        "circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.open_since = Some(now);
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!("half-open trial failed, circuit breaker re-opened");
                inner.state = CircuitState::Open;
                inner.open_since = Some(now);
                inner.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(failures: u32, successes: u32, open_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitConfig {
            failure_threshold: failures,
            success_threshold: successes,
            open_timeout: Duration::from_secs(open_secs),
        })
        .unwrap()
    }

    async fn fail(breaker: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), CircuitError<&'static str>> {
        breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("boom")
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), CircuitError<&'static str>> {
        breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), &'static str>(())
            })
            .await
    }

    #[test]
    fn test_zero_thresholds_are_rejected() {
        for config in [
            CircuitConfig { failure_threshold: 0, ..CircuitConfig::default() },
            CircuitConfig { success_threshold: 0, ..CircuitConfig::default() },
            CircuitConfig { open_timeout: Duration::ZERO, ..CircuitConfig::default() },
        ] {
            assert!(matches!(CircuitBreaker::new(config), Err(HookgateError::Config(_))));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_rejects_without_calling() {
        let breaker = breaker(3, 2, 30);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            assert!(matches!(fail(&breaker, &calls).await, Err(CircuitError::Inner(_))));
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        assert!(fail(&breaker, &calls).await.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(matches!(succeed(&breaker, &calls).await, Err(CircuitError::Open { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_in_closed_resets_failures() {
        let breaker = breaker(3, 1, 30);
        let calls = AtomicUsize::new(0);

        fail(&breaker, &calls).await.ok();
        fail(&breaker, &calls).await.ok();
        succeed(&breaker, &calls).await.unwrap();
        fail(&breaker, &calls).await.ok();
        fail(&breaker, &calls).await.ok();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().failure_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_closes_after_success_threshold() {
        let breaker = breaker(1, 2, 10);
        let calls = AtomicUsize::new(0);

        fail(&breaker, &calls).await.ok();
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(10)).await;
        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let breaker = breaker(1, 3, 10);
        let calls = AtomicUsize::new(0);

        fail(&breaker, &calls).await.ok();
        tokio::time::advance(Duration::from_secs(11)).await;
        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        fail(&breaker, &calls).await.ok();
        assert_eq!(breaker.state(), CircuitState::Open);

        // open_since was reset by the failed trial call
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(matches!(succeed(&breaker, &calls).await, Err(CircuitError::Open { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_forces_closed() {
        let breaker = breaker(1, 1, 60);
        let calls = AtomicUsize::new(0);
        fail(&breaker, &calls).await.ok();
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
