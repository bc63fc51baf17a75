//! Configuration module for the Spotify client.
//!
//! Holds the client-credentials pair, endpoint URLs, the per-attempt
//! timeout and the retry budget.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

use crate::errors::{SpotifyError, SpotifyResult};

/// Default base URL for the Spotify Web API.
pub const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";

/// Default token endpoint for the client-credentials grant.
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Default hard deadline for a single attempt (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = concat!("spotify-client/", env!("CARGO_PKG_VERSION"));

/// Configuration for the Spotify client.
#[derive(Clone)]
pub struct SpotifyConfig {
    /// Client id issued by the Spotify developer dashboard.
    pub client_id: String,
    /// Client secret (stored securely).
    pub(crate) client_secret: SecretString,
    /// Base URL for API requests.
    pub base_url: String,
    /// Token endpoint URL.
    pub token_url: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Maximum retry attempts.
    pub max_retries: u32,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl SpotifyConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SpotifyConfigBuilder {
        SpotifyConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SPOTIFY_CLIENT_ID` (required): client id
    /// - `SPOTIFY_CLIENT_SECRET` (required): client secret
    /// - `SPOTIFY_BASE_URL` (optional): custom API base URL
    /// - `SPOTIFY_TOKEN_URL` (optional): custom token endpoint
    /// - `SPOTIFY_TIMEOUT` (optional): per-attempt timeout in seconds
    /// - `SPOTIFY_MAX_RETRIES` (optional): maximum retry attempts
    pub fn from_env() -> SpotifyResult<Self> {
        let client_id = required_env("SPOTIFY_CLIENT_ID")?;
        let client_secret = required_env("SPOTIFY_CLIENT_SECRET")?;

        let mut builder = SpotifyConfigBuilder::new()
            .client_id(client_id)
            .client_secret(client_secret);

        if let Ok(base_url) = std::env::var("SPOTIFY_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(token_url) = std::env::var("SPOTIFY_TOKEN_URL") {
            builder = builder.token_url(token_url);
        }

        if let Ok(timeout_str) = std::env::var("SPOTIFY_TIMEOUT") {
            match timeout_str.parse::<u64>() {
                Ok(secs) => builder = builder.timeout(Duration::from_secs(secs)),
                Err(_) => tracing::warn!(value = %timeout_str, "Ignoring invalid SPOTIFY_TIMEOUT"),
            }
        }

        if let Ok(retries_str) = std::env::var("SPOTIFY_MAX_RETRIES") {
            match retries_str.parse::<u32>() {
                Ok(retries) => builder = builder.max_retries(retries),
                Err(_) => {
                    tracing::warn!(value = %retries_str, "Ignoring invalid SPOTIFY_MAX_RETRIES");
                }
            }
        }

        builder.build()
    }

    /// Returns the client secret (exposing the secret).
    pub(crate) fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Returns the full URL for an endpoint.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn required_env(name: &str) -> SpotifyResult<String> {
    std::env::var(name).map_err(|_| SpotifyError::Configuration {
        message: format!("{name} environment variable not set"),
    })
}

/// Builder for `SpotifyConfig`.
#[derive(Default)]
pub struct SpotifyConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    base_url: Option<String>,
    token_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    user_agent: Option<String>,
}

impl SpotifyConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client id.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the token endpoint URL.
    pub fn token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the maximum retry attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SpotifyResult<SpotifyConfig> {
        let client_id = self
            .client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| SpotifyError::configuration("Client id is required"))?;

        let client_secret = self
            .client_secret
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| SpotifyError::configuration("Client secret is required"))?;

        let base_url = validate_url(
            self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            "Base URL",
        )?;
        let token_url = validate_url(
            self.token_url.as_deref().unwrap_or(DEFAULT_TOKEN_URL),
            "Token URL",
        )?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(SpotifyError::configuration("Timeout must be greater than zero"));
        }

        Ok(SpotifyConfig {
            client_id,
            client_secret: SecretString::new(client_secret),
            base_url,
            token_url,
            timeout,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

/// Parses a URL and requires HTTPS unless the host is loopback.
fn validate_url(raw: &str, what: &str) -> SpotifyResult<String> {
    let trimmed = raw.trim_end_matches('/');
    let url = Url::parse(trimmed)?;

    let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    if url.scheme() != "https" && !(url.scheme() == "http" && loopback) {
        return Err(SpotifyError::configuration(format!("{what} must use HTTPS")));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SpotifyConfigBuilder {
        SpotifyConfig::builder()
            .client_id("client-id")
            .client_secret("client-secret")
    }

    #[test]
    fn test_config_builder_success() {
        let config = builder()
            .base_url("https://api.example.com/v1/")
            .timeout(Duration::from_secs(10))
            .max_retries(5)
            .build()
            .unwrap();

        assert_eq!(config.client_secret(), "client-secret");
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.user_agent.starts_with("spotify-client/"));
    }

    #[test]
    fn test_config_builder_missing_credentials() {
        assert!(SpotifyConfig::builder().client_secret("s").build().is_err());
        assert!(SpotifyConfig::builder().client_id("id").build().is_err());
        assert!(builder().client_secret("").build().is_err());
    }

    #[test]
    fn test_config_rejects_plain_http() {
        let result = builder().base_url("http://api.spotify.com/v1").build();
        assert!(matches!(result, Err(SpotifyError::Configuration { .. })));
    }

    #[test]
    fn test_config_allows_loopback_http() {
        let config = builder()
            .base_url("http://127.0.0.1:8080/v1")
            .token_url("http://localhost:8080/api/token")
            .build()
            .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:8080/v1");
    }

    #[test]
    fn test_config_rejects_garbage_url() {
        assert!(builder().token_url("not a url").build().is_err());
    }

    #[test]
    fn test_endpoint_url() {
        let config = builder().build().unwrap();

        assert_eq!(
            config.endpoint_url("/tracks/abc"),
            "https://api.spotify.com/v1/tracks/abc"
        );
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let config = builder().client_secret("super-secret-value").build().unwrap();

        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super-secret-value"));
    }
}
