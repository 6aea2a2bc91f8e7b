//! Circuit breaker guarding calls to the external scorer.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: scorer assumed down, calls fail fast
//! - Half-Open: a few trial calls probe whether the scorer recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: next call attempt after cooldown_ms since the last failure
//! Half-Open → Closed: consecutive successes >= success_threshold
//! Half-Open → Open: any probe fails
//! ```
//!
//! # Design Decisions
//! - Open → Half-Open happens on an attempted call, never on a timer
//! - Fail fast in Open state (the protected operation is not invoked)
//! - Half-Open admits at most `success_threshold` concurrent probes
//! - Counters sit behind a mutex that is never held across an await

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    /// Numeric encoding used for the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Call rejected without running the operation.
    #[error("circuit breaker open")]
    Open,

    /// The operation ran and failed; its error is passed through untouched.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }
}

/// Invalid breaker configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BreakerConfigError {
    #[error("failure_threshold must be greater than zero")]
    ZeroFailureThreshold,

    #[error("success_threshold must be greater than zero")]
    ZeroSuccessThreshold,
}

/// Observability snapshot of the breaker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStatus {
    pub state: BreakerState,
    pub is_open: bool,
    pub failure_count: u32,
    pub threshold: u32,
    pub success_count: u32,
    pub success_threshold: u32,
    pub cooldown_ms: u64,
    pub time_since_last_failure_ms: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure: Option<Instant>,
    /// Probes currently running in Half-Open.
    probes_in_flight: u32,
    /// Bumped on every entry into Half-Open so stale probe guards can be ignored.
    half_open_epoch: u64,
}

impl Inner {
    fn closed() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure: None,
            probes_in_flight: 0,
            half_open_epoch: 0,
        }
    }
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    cooldown: Duration,
    inner: Arc<Mutex<Inner>>,
}

/// Admission ticket for one call.
struct Permit {
    _probe: Option<ProbeGuard>,
}

/// Holds a Half-Open probe slot; releases it on drop, even if the call is abandoned.
struct ProbeGuard {
    inner: Arc<Mutex<Inner>>,
    epoch: u64,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.state == BreakerState::HalfOpen && inner.half_open_epoch == self.epoch {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
    }
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    pub fn new(config: BreakerConfig) -> Result<Self, BreakerConfigError> {
        if config.failure_threshold == 0 {
            return Err(BreakerConfigError::ZeroFailureThreshold);
        }
        if config.success_threshold == 0 {
            return Err(BreakerConfigError::ZeroSuccessThreshold);
        }

        metrics::record_breaker_state(BreakerState::Closed);

        Ok(Self {
            failure_threshold: config.failure_threshold,
            success_threshold: config.success_threshold,
            cooldown: Duration::from_millis(config.cooldown_ms),
            inner: Arc::new(Mutex::new(Inner::closed())),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `operation` through the breaker.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire().ok_or(BreakerError::Open)?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                drop(permit);
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                drop(permit);
                Err(BreakerError::Inner(e))
            }
        }
    }

    fn acquire(&self) -> Option<Permit> {
        let mut inner = self.lock();

        if inner.state == BreakerState::Open {
            let cooled = inner
                .last_failure
                .map_or(true, |at| at.elapsed() >= self.cooldown);
            if !cooled {
                return None;
            }
            self.transition(&mut inner, BreakerState::HalfOpen);
        }

        match inner.state {
            BreakerState::Closed => Some(Permit { _probe: None }),
            BreakerState::HalfOpen => {
                if inner.probes_in_flight >= self.success_threshold {
                    return None;
                }
                inner.probes_in_flight += 1;
                Some(Permit {
                    _probe: Some(ProbeGuard {
                        inner: Arc::clone(&self.inner),
                        epoch: inner.half_open_epoch,
                    }),
                })
            }
            BreakerState::Open => None,
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.success_threshold {
                    self.transition(&mut inner, BreakerState::Closed);
                }
            }
            // A call admitted before the trip finished late; the breaker stays open.
            BreakerState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.last_failure = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    self.transition(&mut inner, BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => {
                inner.consecutive_failures += 1;
                self.transition(&mut inner, BreakerState::Open);
            }
            BreakerState::Open => inner.consecutive_failures += 1,
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState) {
        let from = inner.state;
        inner.state = to;
        match to {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
                inner.consecutive_successes = 0;
                inner.probes_in_flight = 0;
            }
            BreakerState::Open => {
                inner.consecutive_successes = 0;
                inner.probes_in_flight = 0;
            }
            BreakerState::HalfOpen => {
                inner.consecutive_successes = 0;
                inner.probes_in_flight = 0;
                inner.half_open_epoch += 1;
            }
        }

        if to == BreakerState::Open {
            tracing::warn!(
                from = %from,
                failures = inner.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "Circuit breaker opened"
            );
        } else {
            tracing::info!(from = %from, to = %to, "Circuit breaker state change");
        }
        metrics::record_breaker_transition(to);
    }

    /// Current state. Does not trigger the cooldown transition.
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// True when a call made now would be rejected without running.
    pub fn is_rejecting(&self) -> bool {
        let inner = self.lock();
        inner.state == BreakerState::Open
            && inner
                .last_failure
                .is_some_and(|at| at.elapsed() < self.cooldown)
    }

    /// Snapshot for status endpoints.
    pub fn status(&self) -> BreakerStatus {
        let inner = self.lock();
        BreakerStatus {
            state: inner.state,
            is_open: inner.state == BreakerState::Open,
            failure_count: inner.consecutive_failures,
            threshold: self.failure_threshold,
            success_count: inner.consecutive_successes,
            success_threshold: self.success_threshold,
            cooldown_ms: self.cooldown.as_millis() as u64,
            time_since_last_failure_ms: inner.last_failure.map(|at| at.elapsed().as_millis() as u64),
        }
    }

    /// Force the breaker back to Closed with zeroed counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let from = inner.state;
        *inner = Inner {
            half_open_epoch: inner.half_open_epoch,
            ..Inner::closed()
        };
        tracing::info!(from = %from, "Circuit breaker reset");
        metrics::record_breaker_transition(BreakerState::Closed);
    }
}
