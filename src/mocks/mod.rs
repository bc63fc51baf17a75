//! Mock implementations for testing.
//!
//! [`MockTransport`] answers API requests from a FIFO queue and token
//! requests from a separate one, issuing a fresh default token when no
//! token response is queued. [`MockClock`] provides virtual time: sleeping
//! advances it instantly and records the requested duration.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::resilience::Clock;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

/// A canned response, or a transport failure.
#[derive(Debug, Clone)]
pub struct MockResponse {
    outcome: Result<HttpResponse, TransportError>,
    delay: Option<Duration>,
}

impl MockResponse {
    /// Response with an arbitrary status and body.
    pub fn raw(status: u16, body: Vec<u8>) -> Self {
        Self {
            outcome: Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body,
            }),
            delay: None,
        }
    }

    /// 200 response with a JSON body.
    pub fn json<T: Serialize>(body: &T) -> Self {
        Self::json_status(200, body)
    }

    /// JSON response with the given status.
    pub fn json_status<T: Serialize>(status: u16, body: &T) -> Self {
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        Self::raw(status, bytes).with_header("content-type", "application/json")
    }

    /// Error response in Spotify's `{"error": {"status", "message"}}` envelope.
    pub fn error(status: u16, message: &str) -> Self {
        Self::json_status(
            status,
            &serde_json::json!({ "error": { "status": status, "message": message } }),
        )
    }

    /// 429 response, optionally carrying `Retry-After`.
    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        let response = Self::error(429, "API rate limit exceeded");
        match retry_after {
            Some(secs) => response.with_header("retry-after", secs.to_string()),
            None => response,
        }
    }

    /// Successful client-credentials token response.
    pub fn token(access_token: &str, expires_in: u64) -> Self {
        Self::json(&serde_json::json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        }))
    }

    /// Connection failure instead of a response.
    pub fn connection_error(message: &str) -> Self {
        Self {
            outcome: Err(TransportError::Connection {
                message: message.to_string(),
            }),
            delay: None,
        }
    }

    /// Adds a response header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        if let Ok(response) = &mut self.outcome {
            response.headers.insert(name.to_lowercase(), value.into());
        }
        self
    }

    /// Delays the response by real (tokio) time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A request as seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// When the request was sent, on the attached clock if any.
    pub at: Instant,
}

impl RecordedRequest {
    /// Returns true if this was a token endpoint request.
    pub fn is_token_request(&self) -> bool {
        is_token_url(&self.url)
    }

    /// Value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let url = url::Url::parse(&self.url).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

fn is_token_url(url: &str) -> bool {
    url.split('?').next().is_some_and(|path| path.ends_with("/token"))
}

/// Mock HTTP transport.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    token_responses: Mutex<VecDeque<MockResponse>>,
    default_response: Mutex<Option<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    clock: Option<Arc<dyn Clock>>,
    issued_tokens: AtomicU64,
}

impl MockTransport {
    /// Creates an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock transport that timestamps requests on `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    /// Queues an API response.
    pub fn queue(&self, response: MockResponse) -> &Self {
        self.responses.lock().push_back(response);
        self
    }

    /// Queues a 200 JSON API response.
    pub fn queue_json<T: Serialize>(&self, body: &T) -> &Self {
        self.queue(MockResponse::json(body))
    }

    /// Queues a token endpoint response.
    pub fn queue_token(&self, response: MockResponse) -> &Self {
        self.token_responses.lock().push_back(response);
        self
    }

    /// Response used once the API queue is empty.
    pub fn set_default(&self, response: MockResponse) {
        *self.default_response.lock() = Some(response);
    }

    /// All recorded requests, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Total number of requests, token requests included.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests to the API, excluding the token endpoint.
    pub fn api_requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| !r.is_token_request())
            .cloned()
            .collect()
    }

    /// Number of token endpoint requests.
    pub fn token_request_count(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.is_token_request())
            .count()
    }

    fn next_response(&self, is_token: bool) -> MockResponse {
        if is_token {
            if let Some(response) = self.token_responses.lock().pop_front() {
                return response;
            }
            let n = self.issued_tokens.fetch_add(1, Ordering::SeqCst) + 1;
            return MockResponse::token(&format!("mock-token-{n}"), 3600);
        }

        if let Some(response) = self.responses.lock().pop_front() {
            return response;
        }
        self.default_response
            .lock()
            .clone()
            .unwrap_or_else(|| MockResponse::error(500, "No mock response queued"))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let is_token = is_token_url(&request.url);
        let at = self.clock.as_ref().map_or_else(Instant::now, |c| c.now());

        self.requests.lock().push(RecordedRequest {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body: request.body,
            at,
        });

        let response = self.next_response(is_token);
        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }
        response.outcome
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("queued", &self.responses.lock().len())
            .field("requests", &self.request_count())
            .finish()
    }
}

/// Virtual clock. `sleep` returns immediately after advancing time.
#[derive(Debug)]
pub struct MockClock {
    start: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl MockClock {
    /// Creates a clock at an arbitrary fixed start.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Moves time forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }

    /// Durations passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
    }
}

/// Sample API payloads.
pub mod fixtures {
    use crate::types::{
        AlbumSummary, ArtistSummary, AudioFeatures, ExternalUrls, Image, Paging, SearchResult,
        Track,
    };

    /// A track by Oasis with three cover sizes.
    pub fn track(id: &str, name: &str) -> Track {
        Track {
            id: id.to_string(),
            name: name.to_string(),
            uri: Some(format!("spotify:track:{id}")),
            duration_ms: 258_773,
            explicit: false,
            popularity: Some(80),
            preview_url: None,
            track_number: Some(3),
            artists: vec![ArtistSummary {
                id: Some("2DaxqgrOhkeH0fpeiQq2f4".to_string()),
                name: "Oasis".to_string(),
                uri: Some("spotify:artist:2DaxqgrOhkeH0fpeiQq2f4".to_string()),
                external_urls: ExternalUrls::default(),
            }],
            album: Some(AlbumSummary {
                id: Some("1VW1MFNstoRIOZ2J9hSgMO".to_string()),
                name: "(What's The Story) Morning Glory?".to_string(),
                album_type: Some("album".to_string()),
                release_date: Some("1995-10-02".to_string()),
                images: vec![
                    image("https://i.scdn.co/image/medium", 300),
                    image("https://i.scdn.co/image/large", 640),
                    image("https://i.scdn.co/image/small", 64),
                ],
                artists: Vec::new(),
            }),
            external_urls: ExternalUrls {
                spotify: Some(format!("https://open.spotify.com/track/{id}")),
            },
        }
    }

    fn image(url: &str, size: u32) -> Image {
        Image {
            url: url.to_string(),
            height: Some(size),
            width: Some(size),
        }
    }

    /// A single search page holding `tracks`.
    pub fn search_result(tracks: Vec<Track>) -> SearchResult {
        let total = u32::try_from(tracks.len()).unwrap_or(u32::MAX);
        SearchResult {
            tracks: Paging {
                items: tracks,
                limit: 20,
                offset: 0,
                total,
                next: None,
            },
        }
    }

    /// Audio features for `id` in E major at 87 BPM.
    pub fn audio_features(id: &str) -> AudioFeatures {
        AudioFeatures {
            id: id.to_string(),
            tempo: 87.0,
            key: 4,
            mode: 1,
            time_signature: 4,
            duration_ms: 258_773,
            danceability: 0.38,
            energy: 0.89,
            acousticness: 0.0005,
            instrumentalness: 0.0,
            valence: 0.45,
            loudness: -4.1,
        }
    }
}
