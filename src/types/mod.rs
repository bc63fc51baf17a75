//! Spotify Web API data types.
//!
//! Only the fields needed for song matching are modeled; unknown fields are
//! ignored on deserialization.

mod search;
mod track;

pub use search::{Paging, SearchQuery, SearchResult, MAX_SEARCH_LIMIT, MAX_SEARCH_OFFSET};
pub use track::{AlbumSummary, ArtistSummary, AudioFeatures, ExternalUrls, Image, Track, TrackList};
