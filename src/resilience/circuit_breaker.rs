//! Circuit breaker implementation.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::Clock;
use crate::errors::{SpotifyError, SpotifyResult};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally.
    Closed,
    /// Circuit is open, requests are rejected.
    Open,
    /// Cooldown elapsed, a single trial request is let through.
    HalfOpen,
}

/// Admission granted by [`CircuitBreaker::before_call`].
///
/// A trial permit must end in `on_success`, `on_failure` or
/// [`CircuitBreaker::release`]; otherwise the half-open circuit keeps
/// rejecting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPermit {
    trial: Option<u64>,
}

impl CallPermit {
    /// Returns true if this call is the half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial.is_some()
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening.
    pub failure_threshold: u32,
    /// Time to stay open before allowing a trial request.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the cooldown.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Id of the trial currently in flight.
    trial: Option<u64>,
    next_trial: u64,
}

impl BreakerState {
    fn start_trial(&mut self) -> CallPermit {
        self.next_trial = self.next_trial.wrapping_add(1);
        self.trial = Some(self.next_trial);
        CallPermit { trial: self.trial }
    }
}

/// Circuit breaker shared by every operation of one client.
///
/// All methods take `&self`; the state sits behind a mutex that is never held
/// across an await point.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker.
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial: None,
                next_trial: 0,
            }),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Returns the number of consecutive failures.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Checks whether a call may proceed.
    ///
    /// Fails with `CircuitOpen` while open and cooling down. Once the cooldown
    /// has elapsed the circuit moves to half-open and exactly one call is
    /// admitted as the trial; others are rejected until it finishes.
    pub fn before_call(&self) -> SpotifyResult<CallPermit> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(CallPermit { trial: None }),
            CircuitState::HalfOpen if inner.trial.is_some() => Err(SpotifyError::CircuitOpen),
            CircuitState::HalfOpen => Ok(inner.start_trial()),
            CircuitState::Open => {
                let cooled_down = inner.opened_at.map_or(true, |opened_at| {
                    self.clock.now().saturating_duration_since(opened_at) >= self.config.cooldown
                });
                if cooled_down {
                    tracing::info!("Circuit breaker transitioning to half-open");
                    inner.state = CircuitState::HalfOpen;
                    Ok(inner.start_trial())
                } else {
                    Err(SpotifyError::CircuitOpen)
                }
            }
        }
    }

    /// Ends a trial whose outcome said nothing about service health, such as
    /// a 404. The circuit stays half-open and admits the next call as a trial.
    pub fn release(&self, permit: CallPermit) {
        let mut inner = self.inner.lock();
        if permit.trial.is_some() && inner.trial == permit.trial {
            inner.trial = None;
        }
    }

    /// Records a successful call.
    pub fn on_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!("Circuit breaker closing after successful trial");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial = None;
    }

    /// Records a failed call.
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.trial = None;

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker opening"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(self.clock.now());
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!("Circuit breaker re-opening after failed trial");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(self.clock.now());
            }
            CircuitState::Open => {}
        }
    }

    /// Resets the circuit breaker to closed state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial = None;
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .finish()
    }
}
