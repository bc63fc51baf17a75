//! Request executor: one HTTP attempt with a hard deadline, classified.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AccessToken;
use crate::errors::{ApiErrorResponse, SpotifyError, SpotifyResult};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Performs exactly one HTTP attempt and maps the outcome to the error
/// taxonomy.
///
/// It never touches the token cache or the circuit breaker; retries and
/// credential refresh are decided by the caller.
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl RequestExecutor {
    /// Creates a new request executor.
    pub fn new(transport: Arc<dyn HttpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Returns the per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `request` with the bearer credential and returns the 2xx response.
    pub async fn execute(
        &self,
        request: HttpRequest,
        token: &AccessToken,
    ) -> SpotifyResult<HttpResponse> {
        let request = request
            .with_header("Authorization", token.authorization_header())
            .with_timeout(self.timeout);

        let response = tokio::time::timeout(self.timeout, self.transport.send(request))
            .await
            .map_err(|_| SpotifyError::Timeout {
                message: format!("no response within {:?}", self.timeout),
            })??;

        classify(response)
    }

    /// Like [`execute`](Self::execute), then deserializes the JSON body.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        token: &AccessToken,
    ) -> SpotifyResult<T> {
        let response = self.execute(request, token).await?;
        response.json().map_err(|e| SpotifyError::Serialization {
            message: format!("Failed to parse response: {e}"),
        })
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Maps an HTTP response to success or a classified error.
pub fn classify(response: HttpResponse) -> SpotifyResult<HttpResponse> {
    match response.status {
        200..=299 => Ok(response),
        401 => Err(SpotifyError::AuthExpired),
        429 => Err(SpotifyError::RateLimited {
            retry_after: parse_retry_after(&response),
        }),
        status @ 500..=599 => Err(SpotifyError::Server { status }),
        status => {
            let message = response
                .json::<ApiErrorResponse>()
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("HTTP error: {status}"));
            Err(SpotifyError::Api { status, message })
        }
    }
}

/// Reads `Retry-After` as whole seconds.
fn parse_retry_after(response: &HttpResponse) -> Option<u64> {
    response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockResponse, MockTransport};
    use secrecy::SecretString;
    use std::collections::HashMap;
    use std::time::Instant;
    use test_case::test_case;

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    fn token() -> AccessToken {
        AccessToken {
            token: SecretString::new("test-token".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        }
    }

    #[test_case(401 ; "unauthorized")]
    fn test_classify_auth_expired(status: u16) {
        assert!(matches!(classify(response(status)), Err(SpotifyError::AuthExpired)));
    }

    #[test_case(500)]
    #[test_case(502)]
    #[test_case(503)]
    #[test_case(504)]
    fn test_classify_server_error(status: u16) {
        match classify(response(status)) {
            Err(SpotifyError::Server { status: s }) => assert_eq!(s, status),
            other => panic!("Expected Server error, got {other:?}"),
        }
    }

    #[test_case(Some("5"), Some(5) ; "numeric header")]
    #[test_case(Some(" 12 "), Some(12) ; "padded header")]
    #[test_case(Some("Wed, 21 Oct 2015 07:28:00 GMT"), None ; "http date ignored")]
    #[test_case(None, None ; "missing header")]
    fn test_classify_rate_limited(header: Option<&str>, expected: Option<u64>) {
        let mut resp = response(429);
        if let Some(value) = header {
            resp.headers.insert("retry-after".to_string(), value.to_string());
        }

        match classify(resp) {
            Err(SpotifyError::RateLimited { retry_after }) => assert_eq!(retry_after, expected),
            other => panic!("Expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_api_error_reads_envelope() {
        let mut resp = response(404);
        resp.body = serde_json::to_vec(&serde_json::json!({
            "error": { "status": 404, "message": "Non existing id" }
        }))
        .unwrap();

        match classify(resp) {
            Err(SpotifyError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Non existing id");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_adds_bearer_header() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&serde_json::json!({"ok": true}));
        let executor = RequestExecutor::new(transport.clone(), Duration::from_secs(30));

        let value: serde_json::Value = executor
            .execute_json(HttpRequest::get("https://api.spotify.com/v1/tracks/abc"), &token())
            .await
            .unwrap();

        assert_eq!(value["ok"], true);
        let request = transport.last_request().unwrap();
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Bearer test-token")
        );
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::json(&serde_json::json!({})).with_delay(Duration::from_millis(500)));
        let executor = RequestExecutor::new(transport, Duration::from_millis(20));

        let result = executor
            .execute(HttpRequest::get("https://api.spotify.com/v1/tracks/abc"), &token())
            .await;

        assert!(matches!(result, Err(SpotifyError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_execute_bad_json_is_serialization_error() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::raw(200, b"not json".to_vec()));
        let executor = RequestExecutor::new(transport, Duration::from_secs(30));

        let result: SpotifyResult<serde_json::Value> = executor
            .execute_json(HttpRequest::get("https://api.spotify.com/v1/tracks/abc"), &token())
            .await;

        assert!(matches!(result, Err(SpotifyError::Serialization { .. })));
    }
}
