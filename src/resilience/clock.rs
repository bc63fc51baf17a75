//! Time source used for backoff sleeps, circuit cooldowns and token expiry.

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Monotonic clock with an async sleep.
///
/// Everything time-dependent in the client goes through this trait so tests
/// can substitute virtual time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Suspends the current task for `duration` without blocking the runtime.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::time::Instant` and `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
