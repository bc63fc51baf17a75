//! Runs one logical operation through the circuit breaker, token cache and
//! backoff policy.

use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

use super::backoff::{BackoffPolicy, RetryDecision};
use super::circuit_breaker::{CallPermit, CircuitBreaker, CircuitState};
use super::clock::Clock;
use super::ResilienceConfig;
use crate::auth::{AccessToken, TokenCache};
use crate::errors::{SpotifyError, SpotifyResult};
use crate::observability::ClientMetrics;

/// Per-operation retry bookkeeping.
#[derive(Debug, Default)]
struct RetryContext {
    /// Attempts made, including the credential retry.
    attempts: u32,
    /// Backoff retries performed so far.
    retries: u32,
    /// Whether the one credential refresh has been used.
    credential_refreshed: bool,
}

/// Releases a half-open trial that ended without reaching the breaker,
/// including when the operation future is dropped.
struct PermitGuard<'a> {
    breaker: &'a CircuitBreaker,
    permit: CallPermit,
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        self.breaker.release(self.permit);
    }
}

/// Orchestrates circuit breaker, credential refresh and backoff.
pub struct ResilienceOrchestrator {
    policy: BackoffPolicy,
    circuit_breaker: CircuitBreaker,
    clock: Arc<dyn Clock>,
    metrics: Arc<ClientMetrics>,
}

impl ResilienceOrchestrator {
    /// Creates a new resilience orchestrator.
    pub fn new(config: ResilienceConfig, clock: Arc<dyn Clock>, metrics: Arc<ClientMetrics>) -> Self {
        Self {
            policy: BackoffPolicy::new(config.backoff),
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker, Arc::clone(&clock)),
            clock,
            metrics,
        }
    }

    /// Executes `operation` with a bearer credential, applying the retry rules.
    ///
    /// The circuit is checked once, before the first attempt. A rejected
    /// credential is refreshed and retried at most once per operation and does
    /// not use up the retry budget.
    pub async fn execute<F, Fut, T>(&self, tokens: &TokenCache, operation: F) -> SpotifyResult<T>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: Future<Output = SpotifyResult<T>>,
    {
        let operation_id = uuid::Uuid::new_v4();
        let span = tracing::debug_span!("resilient_operation", %operation_id);

        self.metrics.record_operation();
        let result = self.run(tokens, operation).instrument(span).await;
        match &result {
            Ok(_) => self.metrics.record_success(),
            Err(SpotifyError::CircuitOpen) => {
                self.metrics.record_circuit_rejection();
                self.metrics.record_failure();
            }
            Err(_) => self.metrics.record_failure(),
        }
        result
    }

    async fn run<F, Fut, T>(&self, tokens: &TokenCache, operation: F) -> SpotifyResult<T>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: Future<Output = SpotifyResult<T>>,
    {
        let permit = self.circuit_breaker.before_call()?;
        let _permit = PermitGuard {
            breaker: &self.circuit_breaker,
            permit,
        };
        self.attempt_loop(tokens, operation).await
    }

    async fn attempt_loop<F, Fut, T>(&self, tokens: &TokenCache, operation: F) -> SpotifyResult<T>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: Future<Output = SpotifyResult<T>>,
    {
        let mut token = tokens.get_token().await?;
        let mut ctx = RetryContext::default();

        loop {
            ctx.attempts += 1;
            self.metrics.record_attempt();

            let err = match operation(token.clone()).await {
                Ok(value) => {
                    self.circuit_breaker.on_success();
                    return Ok(value);
                }
                Err(err) => err,
            };

            match self.policy.decide(ctx.retries, &err) {
                RetryDecision::RefreshCredential => {
                    if ctx.credential_refreshed {
                        tracing::warn!("Fresh credential was rejected as well");
                        return Err(err);
                    }
                    ctx.credential_refreshed = true;
                    self.metrics.record_auth_retry();
                    tokens.invalidate(&token).await;
                    token = tokens.get_token().await?;
                }
                RetryDecision::Retry(delay) => {
                    self.circuit_breaker.on_failure();
                    ctx.retries += 1;
                    self.metrics.record_retry();
                    tracing::info!(
                        attempt = ctx.attempts,
                        retry = ctx.retries,
                        max_retries = self.policy.config().max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying after error"
                    );
                    self.clock.sleep(delay).await;
                }
                RetryDecision::GiveUp if err.should_circuit_break() => {
                    self.circuit_breaker.on_failure();
                    tracing::warn!(
                        attempts = ctx.attempts,
                        kind = err.kind(),
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(SpotifyError::Exhausted {
                        attempts: ctx.attempts,
                        cause: Box::new(err),
                    });
                }
                RetryDecision::GiveUp => return Err(err),
            }
        }
    }

    /// Returns the circuit breaker.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Returns the current circuit state.
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Returns the backoff policy.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

impl std::fmt::Debug for ResilienceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceOrchestrator")
            .field("policy", &self.policy)
            .field("circuit_breaker", &self.circuit_breaker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{TokenGrant, TokenProvider};
    use crate::mocks::MockClock;
    use crate::resilience::{BackoffConfig, CircuitBreakerConfig};
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct StaticProvider;

    #[async_trait]
    impl TokenProvider for StaticProvider {
        async fn issue_token(&self) -> SpotifyResult<TokenGrant> {
            Ok(TokenGrant {
                access_token: SecretString::new("token".to_string()),
                token_type: "Bearer".to_string(),
                expires_in: Duration::from_secs(3600),
            })
        }
    }

    fn setup(config: ResilienceConfig) -> (ResilienceOrchestrator, TokenCache, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new());
        let orchestrator =
            ResilienceOrchestrator::new(config, clock.clone(), Arc::new(ClientMetrics::new()));
        let tokens = TokenCache::new(Arc::new(StaticProvider), clock.clone());
        (orchestrator, tokens, clock)
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let (orchestrator, tokens, clock) = setup(ResilienceConfig::default());

        let result = orchestrator
            .execute(&tokens, |_| async { Ok::<_, SpotifyError>("success") })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_retries_then_exhausts() {
        let (orchestrator, tokens, clock) = setup(ResilienceConfig::default());
        let attempts = AtomicU32::new(0);

        let result: SpotifyResult<()> = orchestrator
            .execute(&tokens, |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(SpotifyError::server(500)) }
            })
            .await;

        match result {
            Err(SpotifyError::Exhausted { attempts: n, cause }) => {
                assert_eq!(n, 4);
                assert!(matches!(*cause, SpotifyError::Server { status: 500 }));
            }
            other => panic!("Expected Exhausted, got {other:?}"),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_retryable_error_passes_through() {
        let (orchestrator, tokens, _) = setup(ResilienceConfig::default());

        let result: SpotifyResult<()> = orchestrator
            .execute(&tokens, |_| async {
                Err(SpotifyError::Api {
                    status: 404,
                    message: "non existing id".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(SpotifyError::Api { status: 404, .. })));
        assert_eq!(orchestrator.circuit_breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_trial_with_neutral_outcome_is_released() {
        let config = ResilienceConfig {
            backoff: BackoffConfig::no_retries(),
            circuit_breaker: CircuitBreakerConfig::new().failure_threshold(1),
        };
        let (orchestrator, tokens, clock) = setup(config);

        let _ = orchestrator
            .execute(&tokens, |_| async { Err::<(), _>(SpotifyError::server(500)) })
            .await;
        clock.advance(Duration::from_secs(60));

        let result: SpotifyResult<()> = orchestrator
            .execute(&tokens, |_| async {
                Err(SpotifyError::Api {
                    status: 404,
                    message: "non existing id".to_string(),
                })
            })
            .await;
        assert!(matches!(result, Err(SpotifyError::Api { status: 404, .. })));
        assert_eq!(orchestrator.circuit_state(), CircuitState::HalfOpen);

        let result = orchestrator
            .execute(&tokens, |_| async { Ok::<_, SpotifyError>(()) })
            .await;
        assert!(result.is_ok());
        assert_eq!(orchestrator.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_dropped_trial_is_released() {
        let config = ResilienceConfig {
            backoff: BackoffConfig::no_retries(),
            circuit_breaker: CircuitBreakerConfig::new().failure_threshold(1),
        };
        let (orchestrator, tokens, clock) = setup(config);

        let _ = orchestrator
            .execute(&tokens, |_| async { Err::<(), _>(SpotifyError::server(500)) })
            .await;
        clock.advance(Duration::from_secs(60));

        let stalled = orchestrator.execute(&tokens, |_| std::future::pending::<SpotifyResult<()>>());
        assert!(tokio::time::timeout(Duration::from_millis(10), stalled).await.is_err());

        let result = orchestrator
            .execute(&tokens, |_| async { Ok::<_, SpotifyError>(()) })
            .await;
        assert!(result.is_ok());
        assert_eq!(orchestrator.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_circuit_rejects_without_calling() {
        let config = ResilienceConfig {
            backoff: BackoffConfig::no_retries(),
            circuit_breaker: CircuitBreakerConfig::new().failure_threshold(2),
        };
        let (orchestrator, tokens, _) = setup(config);
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let _ = orchestrator
                .execute(&tokens, |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(SpotifyError::server(503)) }
                })
                .await;
        }

        let result = orchestrator
            .execute(&tokens, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(SpotifyError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.circuit_state(), CircuitState::Open);
    }
}
