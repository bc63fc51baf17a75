//! Resilience layer for the Spotify client.
//!
//! Provides the backoff policy, circuit breaker, injectable clock and the
//! orchestrator that combines them with the token cache.

mod backoff;
mod circuit_breaker;
mod clock;
mod orchestrator;

pub use backoff::{BackoffConfig, BackoffPolicy, RetryDecision};
pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, TokioClock};
pub use orchestrator::ResilienceOrchestrator;

/// Configuration for the resilience orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    /// Backoff configuration.
    pub backoff: BackoffConfig,
    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl ResilienceConfig {
    /// Creates a configuration with the given retry budget and default
    /// everything else.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            backoff: BackoffConfig::new().max_retries(max_retries),
            ..Default::default()
        }
    }
}
