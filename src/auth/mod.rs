//! Authentication for the Spotify Web API.
//!
//! Spotify's catalog endpoints accept an app-only bearer token obtained with
//! the OAuth2 client-credentials grant. [`TokenCache`] keeps one such token
//! per client and re-issues it when it is close to expiry or was rejected.

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::config::SpotifyConfig;
use crate::errors::{SpotifyError, SpotifyResult, TokenErrorResponse};
use crate::observability::ClientMetrics;
use crate::resilience::Clock;
use crate::transport::{HttpRequest, HttpTransport};

/// Tokens within this margin of expiry are treated as expired.
pub const TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// A freshly issued token, as returned by the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The bearer token.
    pub access_token: SecretString,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Lifetime reported by the endpoint.
    pub expires_in: Duration,
}

/// Cached access token with its expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token string.
    pub token: SecretString,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Expiration instant.
    pub expires_at: Instant,
}

impl AccessToken {
    /// Returns true if the token is still usable at `now` with `margin` to spare.
    pub fn is_fresh(&self, now: Instant, margin: Duration) -> bool {
        now.checked_add(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }

    /// Returns the authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

/// Source of new credentials.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Issues a new access token.
    async fn issue_token(&self) -> SpotifyResult<TokenGrant>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// OAuth2 client-credentials grant against the Spotify accounts service.
pub struct ClientCredentialsProvider {
    client_id: String,
    client_secret: SecretString,
    token_url: String,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
}

impl ClientCredentialsProvider {
    /// Creates a provider from explicit credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        token_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            token_url: token_url.into(),
            timeout: crate::config::DEFAULT_TIMEOUT,
            transport,
        }
    }

    /// Creates a provider from the client configuration.
    pub fn from_config(config: &SpotifyConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: SecretString::new(config.client_secret().to_string()),
            token_url: config.token_url.clone(),
            timeout: config.timeout,
            transport,
        }
    }

    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret.expose_secret());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        format!("Basic {encoded}")
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    async fn issue_token(&self) -> SpotifyResult<TokenGrant> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .finish();

        let request = HttpRequest::post(&self.token_url)
            .with_header("Authorization", self.basic_auth_header())
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_header("Accept", "application/json")
            .with_body(body.into_bytes())
            .with_timeout(self.timeout);

        let response = self.transport.send(request).await?;

        match response.status {
            200..=299 => {
                let token: TokenResponse = response.json()?;
                tracing::debug!(expires_in = token.expires_in, "Issued access token");
                Ok(TokenGrant {
                    access_token: SecretString::new(token.access_token),
                    token_type: token.token_type,
                    expires_in: Duration::from_secs(token.expires_in),
                })
            }
            429 => Err(SpotifyError::rate_limited(
                response.header("retry-after").and_then(|v| v.trim().parse().ok()),
            )),
            500..=599 => Err(SpotifyError::server(response.status)),
            status => {
                let message = response
                    .json::<TokenErrorResponse>()
                    .map(|e| match e.error_description {
                        Some(description) => format!("{}: {description}", e.error),
                        None => e.error,
                    })
                    .unwrap_or_else(|_| format!("token endpoint returned HTTP {status}"));
                Err(SpotifyError::Authentication { message })
            }
        }
    }
}

impl std::fmt::Debug for ClientCredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsProvider")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Holds one bearer credential and refreshes it on demand.
///
/// The lock is held while a new token is issued, so concurrent callers that
/// find the cache empty wait for a single issuance instead of racing.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ClientMetrics>,
    safety_margin: Duration,
    cached: Mutex<Option<AccessToken>>,
    issued: AtomicU64,
}

impl TokenCache {
    /// Creates an empty cache.
    pub fn new(provider: Arc<dyn TokenProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            clock,
            metrics: Arc::new(ClientMetrics::new()),
            safety_margin: TOKEN_SAFETY_MARGIN,
            cached: Mutex::new(None),
            issued: AtomicU64::new(0),
        }
    }

    /// Overrides the expiry safety margin.
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    /// Records issuances on a shared metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns a valid credential, issuing a new one if needed.
    pub async fn get_token(&self) -> SpotifyResult<AccessToken> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(self.clock.now(), self.safety_margin) {
                return Ok(token.clone());
            }
            tracing::debug!("Cached access token is within the expiry margin");
        }

        let grant = self.provider.issue_token().await?;
        self.issued.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_credential_refresh();

        let token = AccessToken {
            token: grant.access_token,
            token_type: grant.token_type,
            expires_at: self.clock.now() + grant.expires_in,
        };
        *cached = Some(token.clone());

        Ok(token)
    }

    /// Drops `rejected` from the cache so the next `get_token` issues a new
    /// credential.
    ///
    /// Does nothing if the cache already holds a different token, which
    /// happens when a concurrent operation has refreshed it in the meantime.
    pub async fn invalidate(&self, rejected: &AccessToken) {
        let mut cached = self.cached.lock().await;
        let is_rejected = cached
            .as_ref()
            .is_some_and(|token| token.token.expose_secret() == rejected.token.expose_secret());

        if is_rejected {
            tracing::info!("Invalidating rejected access token");
            *cached = None;
        } else {
            tracing::debug!("Rejected access token was already replaced");
        }
    }

    /// Drops the cached credential unconditionally.
    pub async fn clear(&self) {
        *self.cached.lock().await = None;
    }

    /// Number of credentials issued by this cache.
    pub fn issued_count(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("safety_margin", &self.safety_margin)
            .field("issued", &self.issued_count())
            .finish()
    }
}
