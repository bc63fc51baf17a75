//! Spotify API client.
//!
//! Ties the token cache, resilience orchestrator and request executor
//! together behind the catalog operations.

mod executor;

pub use executor::{classify, RequestExecutor};

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

use crate::auth::{ClientCredentialsProvider, TokenCache, TokenProvider};
use crate::config::{SpotifyConfig, SpotifyConfigBuilder};
use crate::errors::{SpotifyError, SpotifyResult};
use crate::observability::{ClientMetrics, MetricsSnapshot};
use crate::resilience::{CircuitState, Clock, ResilienceConfig, ResilienceOrchestrator, TokioClock};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::types::{AudioFeatures, SearchQuery, SearchResult, Track, TrackList};

/// Most ids accepted by the several-tracks endpoint.
pub const MAX_TRACK_IDS: usize = 50;

/// The main Spotify client.
///
/// Every operation runs through the same pipeline: circuit check, cached
/// bearer credential, one attempt with a deadline, then retry, refresh or
/// give up depending on how the attempt failed.
///
/// # Example
///
/// ```rust,no_run
/// use spotify_client::SpotifyClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = SpotifyClient::builder()
///         .client_id("your-client-id")
///         .client_secret("your-client-secret")
///         .build()?;
///
///     let results = client.search("track:Wonderwall artist:Oasis").await?;
///     for track in &results.tracks.items {
///         println!("{} - {}", track.artist_names(), track.name);
///     }
///     Ok(())
/// }
/// ```
pub struct SpotifyClient {
    config: SpotifyConfig,
    executor: RequestExecutor,
    tokens: TokenCache,
    resilience: ResilienceOrchestrator,
    metrics: Arc<ClientMetrics>,
}

impl SpotifyClient {
    /// Creates a new client builder.
    pub fn builder() -> SpotifyClientBuilder {
        SpotifyClientBuilder::new()
    }

    /// Creates a client from `SPOTIFY_*` environment variables.
    pub fn from_env() -> SpotifyResult<Self> {
        SpotifyClientBuilder::from_config(SpotifyConfig::from_env()?).build()
    }

    /// Searches the catalog for tracks.
    #[instrument(skip(self, query))]
    pub async fn search(&self, query: impl Into<SearchQuery>) -> SpotifyResult<SearchResult> {
        let query = query.into();
        query.validate()?;

        let url = Url::parse_with_params(&self.config.endpoint_url("search"), query.to_params())?;
        tracing::debug!(q = %query.q, limit = query.limit, offset = query.offset, "Searching tracks");

        self.get_json(url.into()).await
    }

    /// Fetches one track by id.
    #[instrument(skip(self))]
    pub async fn track(&self, id: &str) -> SpotifyResult<Track> {
        validate_id(id)?;
        self.get_json(self.config.endpoint_url(&format!("tracks/{id}")))
            .await
    }

    /// Fetches up to 50 tracks in one request.
    ///
    /// The result has one entry per id, in order; ids Spotify does not know
    /// come back as `None`.
    #[instrument(skip(self), fields(count = ids.len()))]
    pub async fn tracks(&self, ids: &[&str]) -> SpotifyResult<Vec<Option<Track>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > MAX_TRACK_IDS {
            return Err(SpotifyError::validation_param(
                format!("At most {MAX_TRACK_IDS} ids per request"),
                "ids",
            ));
        }
        for id in ids {
            validate_id(id)?;
        }

        let url = Url::parse_with_params(&self.config.endpoint_url("tracks"), [("ids", ids.join(","))])?;
        let list: TrackList = self.get_json(url.into()).await?;
        Ok(list.tracks)
    }

    /// Fetches tempo, key and mood descriptors for a track.
    #[instrument(skip(self))]
    pub async fn audio_features(&self, id: &str) -> SpotifyResult<AudioFeatures> {
        validate_id(id)?;
        self.get_json(self.config.endpoint_url(&format!("audio-features/{id}")))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> SpotifyResult<T> {
        let executor = &self.executor;
        self.resilience
            .execute(&self.tokens, |token| {
                let request = HttpRequest::get(url.clone()).with_header("Accept", "application/json");
                async move { executor.execute_json(request, &token).await }
            })
            .await
    }

    /// Closes the circuit and clears its failure count.
    pub fn reset_circuit_breaker(&self) {
        self.resilience.circuit_breaker().reset();
    }

    /// Drops the cached credential; the next operation issues a new one.
    pub async fn clear_token_cache(&self) {
        self.tokens.clear().await;
    }

    /// Current circuit breaker state.
    pub fn circuit_state(&self) -> CircuitState {
        self.resilience.circuit_state()
    }

    /// Snapshot of the client counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of credentials issued so far.
    pub fn tokens_issued(&self) -> u64 {
        self.tokens.issued_count()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SpotifyConfig {
        &self.config
    }
}

impl std::fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("config", &self.config)
            .field("circuit_state", &self.circuit_state())
            .finish()
    }
}

/// Spotify ids are base62 strings.
fn validate_id(id: &str) -> SpotifyResult<()> {
    if id.is_empty() {
        return Err(SpotifyError::validation_param("Track id is required", "id"));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SpotifyError::validation_param(
            format!("Invalid track id: {id}"),
            "id",
        ));
    }
    Ok(())
}

/// Builder for the Spotify client.
pub struct SpotifyClientBuilder {
    config_builder: SpotifyConfigBuilder,
    transport: Option<Arc<dyn HttpTransport>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    clock: Option<Arc<dyn Clock>>,
    resilience_config: Option<ResilienceConfig>,
}

impl SpotifyClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: SpotifyConfigBuilder::new(),
            transport: None,
            token_provider: None,
            clock: None,
            resilience_config: None,
        }
    }

    /// Creates a builder from an existing configuration.
    pub fn from_config(config: SpotifyConfig) -> Self {
        let config_builder = SpotifyConfigBuilder::new()
            .client_id(config.client_id.clone())
            .client_secret(config.client_secret())
            .base_url(config.base_url.clone())
            .token_url(config.token_url.clone())
            .timeout(config.timeout)
            .max_retries(config.max_retries)
            .user_agent(config.user_agent.clone());

        Self {
            config_builder,
            ..Self::new()
        }
    }

    /// Sets the client id.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.client_id(client_id);
        self
    }

    /// Sets the client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.client_secret(client_secret);
        self
    }

    /// Sets the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    /// Sets the token endpoint URL.
    pub fn token_url(mut self, token_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.token_url(token_url);
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the maximum retry attempts.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config_builder = self.config_builder.max_retries(retries);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom credential source.
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Sets the clock used for backoff sleeps, cooldowns and token expiry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the resilience configuration. Its retry budget takes precedence
    /// over [`max_retries`](Self::max_retries).
    pub fn resilience(mut self, config: ResilienceConfig) -> Self {
        self.resilience_config = Some(config);
        self
    }

    /// Builds the client.
    pub fn build(self) -> SpotifyResult<SpotifyClient> {
        let config = self.config_builder.build()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                ReqwestTransport::new(config.timeout, &config.user_agent).map_err(|e| {
                    SpotifyError::Configuration {
                        message: e.to_string(),
                    }
                })?,
            ),
        };

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(TokioClock));

        let provider: Arc<dyn TokenProvider> = match self.token_provider {
            Some(p) => p,
            None => Arc::new(ClientCredentialsProvider::from_config(
                &config,
                Arc::clone(&transport),
            )),
        };

        let resilience_config = self
            .resilience_config
            .unwrap_or_else(|| ResilienceConfig::with_max_retries(config.max_retries));

        let metrics = Arc::new(ClientMetrics::new());
        let resilience =
            ResilienceOrchestrator::new(resilience_config, Arc::clone(&clock), Arc::clone(&metrics));

        Ok(SpotifyClient {
            executor: RequestExecutor::new(transport, config.timeout),
            tokens: TokenCache::new(provider, clock).with_metrics(Arc::clone(&metrics)),
            resilience,
            metrics,
            config,
        })
    }
}

impl Default for SpotifyClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
