//! Circuit breaker around the external runtime.
//!
//! After `failure_threshold` consecutive failed calls the circuit opens and
//! every call fails fast with [`CircuitBreakerError::Open`] until the reset
//! window elapses. The next call then probes the runtime in `HalfOpen`; enough
//! probe successes close the circuit, a probe failure reopens it.
//!
//! An open circuit is a retryable condition for the evaluator: it surfaces as
//! [`RuntimeExecutionError::CircuitOpen`], never as a fatal error.
//!
//! # Example
//!
//! ```rust
//! use flowforge_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, State};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder()
//!         .failure_threshold(3)
//!         .reset_timeout(Duration::from_secs(30))
//!         .build(),
//! );
//!
//! let result = breaker.call(|| async { Ok::<_, String>(42) }).await;
//! assert!(result.is_ok());
//! assert_eq!(breaker.state().await, State::Closed);
//! # }
//! ```

use flowforge_core::config::RuntimeConfig;
use flowforge_core::error::RuntimeExecutionError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing
    pub reset_timeout: Duration,
    /// Probe successes needed to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            failure_threshold: None,
            reset_timeout: None,
            success_threshold: None,
        }
    }

    /// Configuration matching the runtime section.
    #[must_use]
    pub fn from_runtime_config(config: &RuntimeConfig) -> Self {
        Self::builder()
            .failure_threshold(config.circuit_failure_threshold)
            .reset_timeout(Duration::from_millis(config.circuit_reset_ms))
            .build()
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: Option<u32>,
    reset_timeout: Option<Duration>,
    success_threshold: Option<u32>,
}

impl CircuitBreakerConfigBuilder {
    /// Set the consecutive-failure threshold.
    #[must_use]
    pub const fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Set how long the circuit stays open.
    #[must_use]
    pub const fn reset_timeout(mut self, duration: Duration) -> Self {
        self.reset_timeout = Some(duration);
        self
    }

    /// Set the probe successes needed to close.
    #[must_use]
    pub const fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = Some(threshold);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        let defaults = CircuitBreakerConfig::default();
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            reset_timeout: self.reset_timeout.unwrap_or(defaults.reset_timeout),
            success_threshold: self.success_threshold.unwrap_or(defaults.success_threshold),
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Calls pass through
    Closed,
    /// Calls fail fast
    Open,
    /// Probing whether the runtime recovered
    HalfOpen,
}

impl State {
    /// Numeric value exported on the circuit state gauge.
    #[must_use]
    pub const fn gauge_value(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

/// Errors from circuit breaker calls.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open
    #[error("circuit breaker is open, retry after {retry_after:?}")]
    Open {
        /// Remaining open time
        retry_after: Duration,
    },
    /// The wrapped call failed
    #[error(transparent)]
    Inner(E),
}

impl From<CircuitBreakerError<RuntimeExecutionError>> for RuntimeExecutionError {
    fn from(err: CircuitBreakerError<RuntimeExecutionError>) -> Self {
        match err {
            CircuitBreakerError::Open { retry_after } => Self::CircuitOpen {
                retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            },
            CircuitBreakerError::Inner(inner) => inner,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: State,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

/// Shared circuit breaker. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<RwLock<Inner>>,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            inner: Arc::new(RwLock::new(Inner {
                state: State::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
        }
    }

    /// Current state.
    pub async fn state(&self) -> State {
        self.inner.read().await.state
    }

    /// Run `operation` through the breaker.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerError::Open`] without running the operation when
    /// the circuit is open, or [`CircuitBreakerError::Inner`] when it fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if let Some(retry_after) = self.rejection().await {
            tracing::debug!(?retry_after, "Circuit open, rejecting runtime call");
            return Err(CircuitBreakerError::Open { retry_after });
        }

        match operation().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// `Some(remaining)` if the call must be rejected.
    async fn rejection(&self) -> Option<Duration> {
        let mut inner = self.inner.write().await;
        if inner.state != State::Open {
            return None;
        }
        let elapsed = inner.opened_at.map_or(Duration::ZERO, |at| at.elapsed());
        if elapsed >= self.config.reset_timeout {
            tracing::info!("Circuit breaker transitioning OPEN -> HALF_OPEN");
            inner.state = State::HalfOpen;
            inner.success_count = 0;
            record_state(State::HalfOpen);
            None
        } else {
            Some(self.config.reset_timeout - elapsed)
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.write().await;
        match inner.state {
            State::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    tracing::info!("Circuit breaker transitioning HALF_OPEN -> CLOSED");
                    inner.state = State::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at = None;
                    record_state(State::Closed);
                }
            }
            State::Closed | State::Open => inner.failure_count = 0,
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.write().await;
        match inner.state {
            State::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.failure_count,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker transitioning CLOSED -> OPEN"
                    );
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                    record_state(State::Open);
                }
            }
            State::HalfOpen => {
                tracing::warn!("Circuit breaker transitioning HALF_OPEN -> OPEN (probe failed)");
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
                inner.success_count = 0;
                record_state(State::Open);
            }
            State::Open => inner.failure_count += 1,
        }
    }
}

fn record_state(state: State) {
    metrics::gauge!("flowforge_runtime_circuit_state").set(state.gauge_value());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(threshold)
                .reset_timeout(Duration::from_millis(reset_ms))
                .build(),
        )
    }

    #[tokio::test]
    async fn test_stays_closed_on_success() {
        let breaker = breaker(3, 100);
        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;
        assert_eq!(result, Ok(42));
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let breaker = breaker(2, 100);
        let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        let _ = breaker.call(|| async { Ok::<_, &str>(1) }).await;
        let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn test_opens_and_rejects() {
        let breaker = breaker(2, 10_000);
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }
        assert_eq!(breaker.state().await, State::Open);

        let result = breaker.call(|| async { Ok::<_, &str>(42) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open { .. })));
    }

    #[tokio::test]
    async fn test_half_open_probe_closes() {
        let breaker = breaker(1, 50);
        let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let result = breaker.call(|| async { Ok::<_, &str>(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn test_half_open_probe_failure_reopens() {
        let breaker = breaker(1, 50);
        let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let _ = breaker.call(|| async { Err::<i32, _>("still down") }).await;
        assert_eq!(breaker.state().await, State::Open);
    }

    #[test]
    fn test_open_maps_to_retryable_runtime_error() {
        let err: RuntimeExecutionError = CircuitBreakerError::Open {
            retry_after: Duration::from_millis(250),
        }
        .into();
        assert_eq!(err, RuntimeExecutionError::CircuitOpen { retry_after_ms: 250 });
        assert!(err.is_retryable());
    }
}
