//! Spotify Web API Client Library
//!
//! A resilient Rust client for the Spotify catalog endpoints used for song
//! matching: track search, track lookup and audio features.
//!
//! # Features
//!
//! - **Client Credentials**: App-only bearer tokens, cached and refreshed
//!   60 seconds before expiry, re-issued once when rejected
//! - **Retries**: Exponential backoff (1s, 2s, 4s, ... capped at 32s) for
//!   server errors, timeouts and network failures; `Retry-After` honored on 429
//! - **Circuit Breaker**: Opens after 5 consecutive failures, cools down for 60s
//! - **Deterministic Tests**: Injectable [`Clock`](resilience::Clock) and
//!   [`HttpTransport`](transport::HttpTransport)
//! - **Observability**: `tracing` spans and events, operation counters
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use spotify_client::{SearchQuery, SpotifyClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SpotifyClient::from_env()?;
//!
//!     let results = client
//!         .search(SearchQuery::track_by_artist("Wonderwall", "Oasis").limit(5))
//!         .await?;
//!
//!     if let Some(track) = results.tracks.items.first() {
//!         let features = client.audio_features(&track.id).await?;
//!         println!("{} at {:.0} BPM", track.name, features.tempo);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! ```rust,no_run
//! use spotify_client::{get_retry_after, is_rate_limit_error, SpotifyClient, SpotifyError};
//!
//! # async fn run(client: SpotifyClient) {
//! match client.track("3n3Ppam7vgaVa1iaRUc9Lp").await {
//!     Ok(track) => println!("{}", track.name),
//!     Err(SpotifyError::CircuitOpen) => println!("Spotify is unavailable, try later"),
//!     Err(err) if is_rate_limit_error(&err) => {
//!         println!("Rate limited, retry after {:?}s", get_retry_after(&err));
//!     }
//!     Err(err) => println!("Lookup failed: {err}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod resilience;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{SpotifyClient, SpotifyClientBuilder, MAX_TRACK_IDS};
pub use config::SpotifyConfig;
pub use errors::{get_retry_after, is_rate_limit_error, SpotifyError, SpotifyResult};
pub use resilience::{CircuitState, ResilienceConfig};
pub use observability::{LogFormat, LogLevel, LoggingConfig, MetricsSnapshot};

// Type re-exports
pub use types::{
    AlbumSummary, ArtistSummary, AudioFeatures, Image, Paging, SearchQuery, SearchResult, Track,
};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
