//! Error types for the Spotify client.
//!
//! Every failure is classified into one variant of [`SpotifyError`]. The
//! classification drives all retry, backoff and circuit breaker decisions,
//! and terminal errors keep it so callers can decide what to do next.

use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for Spotify operations.
pub type SpotifyResult<T> = Result<T, SpotifyError>;

/// Error type for Spotify client operations.
#[derive(Debug, Clone, Error)]
pub enum SpotifyError {
    /// Configuration error (missing credentials, invalid URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// The token endpoint refused to issue a credential.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message from the token endpoint.
        message: String,
    },

    /// The API rejected the bearer credential (HTTP 401).
    #[error("Access token expired or rejected")]
    AuthExpired,

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limit exceeded{}", .retry_after.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited {
        /// Seconds to wait, from the `Retry-After` header.
        retry_after: Option<u64>,
    },

    /// Server error (5xx status codes).
    #[error("Server error (HTTP {status})")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// The attempt did not complete before the deadline.
    #[error("Request timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
    },

    /// Network/connection error.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// Circuit breaker open.
    #[error("Circuit breaker open: service temporarily unavailable")]
    CircuitOpen,

    /// Retries were used up; `cause` is the last classified failure.
    #[error("Retries exhausted after {attempts} attempts: {cause}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last error seen.
        cause: Box<SpotifyError>,
    },

    /// Non-retryable API error (4xx other than 401 and 429).
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Validation error (request validation failed).
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation issue.
        message: String,
        /// The parameter that caused the error.
        param: Option<String>,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl SpotifyError {
    /// Returns true if this error is retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SpotifyError::RateLimited { .. }
                | SpotifyError::Server { .. }
                | SpotifyError::Timeout { .. }
                | SpotifyError::Network { .. }
        )
    }

    /// Returns true if this error should count against the circuit breaker.
    pub fn should_circuit_break(&self) -> bool {
        self.is_retryable()
    }

    /// Returns the classification of this error.
    ///
    /// For `Exhausted` this is the wrapped cause, otherwise the error itself.
    pub fn classification(&self) -> &SpotifyError {
        match self {
            SpotifyError::Exhausted { cause, .. } => cause.classification(),
            other => other,
        }
    }

    /// Returns the `Retry-After` value carried by a rate limit classification.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.classification() {
            SpotifyError::RateLimited { retry_after } => retry_after.map(Duration::from_secs),
            _ => None,
        }
    }

    /// Short stable name of the classification, used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SpotifyError::Configuration { .. } => "configuration",
            SpotifyError::Authentication { .. } => "authentication",
            SpotifyError::AuthExpired => "auth_expired",
            SpotifyError::RateLimited { .. } => "rate_limited",
            SpotifyError::Server { .. } => "server",
            SpotifyError::Timeout { .. } => "timeout",
            SpotifyError::Network { .. } => "network",
            SpotifyError::CircuitOpen => "circuit_open",
            SpotifyError::Exhausted { .. } => "exhausted",
            SpotifyError::Api { .. } => "api",
            SpotifyError::Validation { .. } => "validation",
            SpotifyError::Serialization { .. } => "serialization",
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SpotifyError::Validation {
            message: message.into(),
            param: None,
        }
    }

    /// Creates a validation error with parameter.
    pub fn validation_param(message: impl Into<String>, param: impl Into<String>) -> Self {
        SpotifyError::Validation {
            message: message.into(),
            param: Some(param.into()),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        SpotifyError::Configuration {
            message: message.into(),
        }
    }

    /// Creates a server error.
    pub fn server(status: u16) -> Self {
        SpotifyError::Server { status }
    }

    /// Creates a rate limit error.
    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        SpotifyError::RateLimited { retry_after }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        SpotifyError::Timeout {
            message: message.into(),
        }
    }
}

/// Returns true iff the terminal error's cause is a rate limit.
pub fn is_rate_limit_error(err: &SpotifyError) -> bool {
    matches!(err.classification(), SpotifyError::RateLimited { .. })
}

/// Returns the `Retry-After` seconds carried by a rate limit cause, if any.
pub fn get_retry_after(err: &SpotifyError) -> Option<u64> {
    match err.classification() {
        SpotifyError::RateLimited { retry_after } => *retry_after,
        _ => None,
    }
}

/// API error envelope returned by the Spotify Web API.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// The error details.
    pub error: ApiErrorDetail,
}

/// Detailed API error information.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorDetail {
    /// The HTTP status echoed by the API.
    pub status: Option<u16>,
    /// The error message.
    pub message: String,
}

/// Error envelope returned by the accounts (token) endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct TokenErrorResponse {
    /// OAuth2 error code.
    pub error: String,
    /// Human readable description.
    pub error_description: Option<String>,
}

impl From<TransportError> for SpotifyError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { timeout } => SpotifyError::Timeout {
                message: format!("no response within {timeout:?}"),
            },
            TransportError::Connection { message } | TransportError::InvalidResponse { message } => {
                SpotifyError::Network { message }
            }
        }
    }
}

impl From<serde_json::Error> for SpotifyError {
    fn from(err: serde_json::Error) -> Self {
        SpotifyError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for SpotifyError {
    fn from(err: url::ParseError) -> Self {
        SpotifyError::Configuration {
            message: format!("Invalid URL: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(SpotifyError::rate_limited(None).is_retryable());
        assert!(SpotifyError::server(503).is_retryable());
        assert!(SpotifyError::timeout("slow").is_retryable());
        assert!(!SpotifyError::AuthExpired.is_retryable());
        assert!(!SpotifyError::CircuitOpen.is_retryable());
        assert!(!SpotifyError::validation("bad").is_retryable());
        assert!(!SpotifyError::Api {
            status: 404,
            message: "not found".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_classification_unwraps_exhausted() {
        let error = SpotifyError::Exhausted {
            attempts: 4,
            cause: Box::new(SpotifyError::server(502)),
        };

        assert!(matches!(
            error.classification(),
            SpotifyError::Server { status: 502 }
        ));
    }

    #[test]
    fn test_is_rate_limit_error() {
        let exhausted = SpotifyError::Exhausted {
            attempts: 4,
            cause: Box::new(SpotifyError::rate_limited(Some(5))),
        };
        assert!(is_rate_limit_error(&exhausted));

        let server = SpotifyError::Exhausted {
            attempts: 4,
            cause: Box::new(SpotifyError::server(500)),
        };
        assert!(!is_rate_limit_error(&server));
        assert!(!is_rate_limit_error(&SpotifyError::CircuitOpen));
    }

    #[test]
    fn test_get_retry_after() {
        let error = SpotifyError::Exhausted {
            attempts: 2,
            cause: Box::new(SpotifyError::rate_limited(Some(30))),
        };
        assert_eq!(get_retry_after(&error), Some(30));
        assert_eq!(error.retry_after(), Some(Duration::from_secs(30)));

        let no_header = SpotifyError::rate_limited(None);
        assert_eq!(get_retry_after(&no_header), None);
        assert_eq!(get_retry_after(&SpotifyError::server(500)), None);
    }

    #[test]
    fn test_rate_limit_display() {
        assert_eq!(
            SpotifyError::rate_limited(Some(5)).to_string(),
            "Rate limit exceeded (retry after 5s)"
        );
        assert_eq!(
            SpotifyError::rate_limited(None).to_string(),
            "Rate limit exceeded"
        );
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: SpotifyError = TransportError::Timeout {
            timeout: Duration::from_secs(30),
        }
        .into();
        assert!(matches!(err, SpotifyError::Timeout { .. }));

        let err: SpotifyError = TransportError::Connection {
            message: "refused".to_string(),
        }
        .into();
        assert!(matches!(err, SpotifyError::Network { .. }));
    }
}
