//! Backoff policy: decides whether and when a failed attempt is retried.

use std::time::Duration;

use crate::errors::SpotifyError;

/// Backoff configuration.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of retries for retryable errors.
    pub max_retries: u32,
    /// Delay before the first retry of a server error or timeout.
    pub initial_delay: Duration,
    /// Upper bound for exponential delays.
    pub max_delay: Duration,
    /// Delay multiplier for exponential backoff.
    pub multiplier: f64,
    /// Delay used for a 429 response without `Retry-After`.
    pub default_rate_limit_delay: Duration,
    /// Whether to add 0-25% random jitter to exponential delays.
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(32_000),
            multiplier: 2.0,
            default_rate_limit_delay: Duration::from_millis(60_000),
            jitter: false,
        }
    }
}

impl BackoffConfig {
    /// Creates a new backoff configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the initial delay.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the multiplier.
    pub fn multiplier(mut self, mult: f64) -> Self {
        self.multiplier = mult;
        self
    }

    /// Sets the delay used when a 429 carries no `Retry-After`.
    pub fn default_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.default_rate_limit_delay = delay;
        self
    }

    /// Sets whether to use jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Creates a configuration with no retries.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given duration, then retry.
    Retry(Duration),
    /// Drop the cached credential and retry immediately.
    RefreshCredential,
    /// Stop and surface the error.
    GiveUp,
}

/// Maps (attempt, error classification) to a retry decision.
#[derive(Debug, Clone, Default)]
pub struct BackoffPolicy {
    config: BackoffConfig,
}

impl BackoffPolicy {
    /// Creates a new backoff policy.
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Decides what to do after `error`, given `retries` already performed.
    pub fn decide(&self, retries: u32, error: &SpotifyError) -> RetryDecision {
        match error {
            SpotifyError::RateLimited { retry_after } => {
                if retries >= self.config.max_retries {
                    return RetryDecision::GiveUp;
                }
                let delay = retry_after
                    .map_or(self.config.default_rate_limit_delay, Duration::from_secs);
                RetryDecision::Retry(delay)
            }
            SpotifyError::Server { .. }
            | SpotifyError::Timeout { .. }
            | SpotifyError::Network { .. } => {
                if retries >= self.config.max_retries {
                    return RetryDecision::GiveUp;
                }
                RetryDecision::Retry(self.exponential_delay(retries))
            }
            SpotifyError::AuthExpired => RetryDecision::RefreshCredential,
            SpotifyError::CircuitOpen
            | SpotifyError::Exhausted { .. }
            | SpotifyError::Api { .. }
            | SpotifyError::Authentication { .. }
            | SpotifyError::Configuration { .. }
            | SpotifyError::Validation { .. }
            | SpotifyError::Serialization { .. } => RetryDecision::GiveUp,
        }
    }

    /// Exponential delay for the given retry index, capped at `max_delay`.
    pub fn exponential_delay(&self, retries: u32) -> Duration {
        let exponent = i32::try_from(retries).unwrap_or(i32::MAX);
        let base_ms = self.config.initial_delay.as_secs_f64()
            * 1000.0
            * self.config.multiplier.powi(exponent);
        let max_ms = self.config.max_delay.as_secs_f64() * 1000.0;
        let delay_ms = base_ms.min(max_ms);

        let delay_ms = if self.config.jitter {
            delay_ms * (1.0 + rand::random::<f64>() * 0.25)
        } else {
            delay_ms
        };

        Duration::from_secs_f64(delay_ms / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_exponential_sequence() {
        let policy = BackoffPolicy::default();
        let error = SpotifyError::server(503);

        let delays: Vec<RetryDecision> = (0..3).map(|n| policy.decide(n, &error)).collect();

        assert_eq!(
            delays,
            vec![
                RetryDecision::Retry(Duration::from_millis(1000)),
                RetryDecision::Retry(Duration::from_millis(2000)),
                RetryDecision::Retry(Duration::from_millis(4000)),
            ]
        );
        assert_eq!(policy.decide(3, &error), RetryDecision::GiveUp);
    }

    #[test]
    fn test_delay_capped() {
        let policy = BackoffPolicy::new(BackoffConfig::new().max_retries(10));

        assert_eq!(policy.exponential_delay(5), Duration::from_millis(32_000));
        assert_eq!(policy.exponential_delay(9), Duration::from_millis(32_000));
    }

    #[test]
    fn test_rate_limit_uses_retry_after() {
        let policy = BackoffPolicy::default();

        assert_eq!(
            policy.decide(0, &SpotifyError::rate_limited(Some(5))),
            RetryDecision::Retry(Duration::from_secs(5))
        );
        assert_eq!(
            policy.decide(0, &SpotifyError::rate_limited(None)),
            RetryDecision::Retry(Duration::from_millis(60_000))
        );
        assert_eq!(
            policy.decide(3, &SpotifyError::rate_limited(Some(1))),
            RetryDecision::GiveUp
        );
    }

    #[test_case(SpotifyError::AuthExpired, RetryDecision::RefreshCredential ; "auth expired refreshes")]
    #[test_case(SpotifyError::CircuitOpen, RetryDecision::GiveUp ; "circuit open never retries")]
    #[test_case(SpotifyError::validation("bad"), RetryDecision::GiveUp ; "validation gives up")]
    #[test_case(SpotifyError::Api { status: 404, message: "missing".into() }, RetryDecision::GiveUp ; "not found gives up")]
    #[test_case(SpotifyError::timeout("slow"), RetryDecision::Retry(Duration::from_millis(1000)) ; "timeout backs off")]
    fn test_decision_by_class(error: SpotifyError, expected: RetryDecision) {
        assert_eq!(BackoffPolicy::default().decide(0, &error), expected);
    }

    #[test]
    fn test_auth_expired_ignores_retry_budget() {
        let policy = BackoffPolicy::new(BackoffConfig::no_retries());
        assert_eq!(
            policy.decide(0, &SpotifyError::AuthExpired),
            RetryDecision::RefreshCredential
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = BackoffPolicy::new(BackoffConfig::new().jitter(true));

        for _ in 0..50 {
            let delay = policy.exponential_delay(1);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(2500));
        }
    }
}
