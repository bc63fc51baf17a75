//! Metrics collection for the Spotify client.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the resilience orchestrator.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    operations: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    circuit_rejections: AtomicU64,
    auth_retries: AtomicU64,
    credential_refreshes: AtomicU64,
}

/// Point-in-time copy of [`ClientMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Logical operations started.
    pub operations: u64,
    /// Operations that returned a result.
    pub successes: u64,
    /// Operations that returned an error.
    pub failures: u64,
    /// HTTP attempts made against the API.
    pub attempts: u64,
    /// Backoff retries performed.
    pub retries: u64,
    /// Operations rejected by an open circuit.
    pub circuit_rejections: u64,
    /// Immediate retries after a rejected credential.
    pub auth_retries: u64,
    /// Credentials issued by the token endpoint.
    pub credential_refreshes: u64,
}

impl MetricsSnapshot {
    /// Calculates success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        let finished = self.successes + self.failures;
        if finished == 0 {
            100.0
        } else {
            (self.successes as f64 / finished as f64) * 100.0
        }
    }
}

impl ClientMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_auth_retry(&self) {
        self.auth_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_credential_refresh(&self) {
        self.credential_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: self.operations.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            auth_retries: self.auth_retries.load(Ordering::Relaxed),
            credential_refreshes: self.credential_refreshes.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters.
    pub fn reset(&self) {
        for counter in [
            &self.operations,
            &self.successes,
            &self.failures,
            &self.attempts,
            &self.retries,
            &self.circuit_rejections,
            &self.auth_retries,
            &self.credential_refreshes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
