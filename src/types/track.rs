//! Track, album, artist and audio feature models.

use serde::{Deserialize, Serialize};

/// Links to the Spotify web player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUrls {
    /// Web player URL.
    #[serde(default)]
    pub spotify: Option<String>,
}

/// Cover art image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image URL.
    pub url: String,
    /// Height in pixels.
    #[serde(default)]
    pub height: Option<u32>,
    /// Width in pixels.
    #[serde(default)]
    pub width: Option<u32>,
}

/// Artist as embedded in a track or album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSummary {
    /// Spotify artist id.
    #[serde(default)]
    pub id: Option<String>,
    /// Artist name.
    pub name: String,
    /// Spotify URI.
    #[serde(default)]
    pub uri: Option<String>,
    /// External links.
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

/// Album as embedded in a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSummary {
    /// Spotify album id.
    #[serde(default)]
    pub id: Option<String>,
    /// Album name.
    pub name: String,
    /// `album`, `single` or `compilation`.
    #[serde(default)]
    pub album_type: Option<String>,
    /// Release date, with the precision Spotify has.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Cover art, widest first.
    #[serde(default)]
    pub images: Vec<Image>,
    /// Album artists.
    #[serde(default)]
    pub artists: Vec<ArtistSummary>,
}

/// A track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Spotify track id.
    pub id: String,
    /// Track name.
    pub name: String,
    /// Spotify URI.
    #[serde(default)]
    pub uri: Option<String>,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// Whether the track has explicit lyrics.
    #[serde(default)]
    pub explicit: bool,
    /// Popularity between 0 and 100.
    #[serde(default)]
    pub popularity: Option<u8>,
    /// 30 second preview, when available.
    #[serde(default)]
    pub preview_url: Option<String>,
    /// Track number on its disc.
    #[serde(default)]
    pub track_number: Option<u32>,
    /// Performing artists.
    #[serde(default)]
    pub artists: Vec<ArtistSummary>,
    /// Album the track appears on.
    #[serde(default)]
    pub album: Option<AlbumSummary>,
    /// External links.
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl Track {
    /// Names of all performing artists joined with ", ".
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Largest cover image, if any.
    pub fn cover_url(&self) -> Option<&str> {
        self.album
            .as_ref()?
            .images
            .iter()
            .max_by_key(|image| image.width.unwrap_or(0))
            .map(|image| image.url.as_str())
    }
}

/// Response of the several-tracks endpoint. Unknown ids come back as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackList {
    /// Tracks in request order.
    pub tracks: Vec<Option<Track>>,
}

/// Audio analysis summary for a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// Spotify track id.
    pub id: String,
    /// Estimated tempo in BPM.
    pub tempo: f64,
    /// Pitch class of the key (0 = C, -1 if undetected).
    pub key: i32,
    /// 1 for major, 0 for minor.
    pub mode: i32,
    /// Estimated beats per bar.
    pub time_signature: u32,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// 0.0 to 1.0.
    #[serde(default)]
    pub danceability: f64,
    /// 0.0 to 1.0.
    #[serde(default)]
    pub energy: f64,
    /// 0.0 to 1.0.
    #[serde(default)]
    pub acousticness: f64,
    /// 0.0 to 1.0.
    #[serde(default)]
    pub instrumentalness: f64,
    /// 0.0 to 1.0.
    #[serde(default)]
    pub valence: f64,
    /// Overall loudness in dB.
    #[serde(default)]
    pub loudness: f64,
}

impl AudioFeatures {
    /// Human readable key, e.g. "E minor". `None` when no key was detected.
    pub fn key_name(&self) -> Option<String> {
        const PITCHES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        let pitch = PITCHES.get(usize::try_from(self.key).ok()?)?;
        let mode = if self.mode == 1 { "major" } else { "minor" };
        Some(format!("{pitch} {mode}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::fixtures;

    #[test]
    fn test_track_deserializes_with_missing_optionals() {
        let track: Track = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "name": "Blackbird"
        }))
        .unwrap();

        assert_eq!(track.id, "abc");
        assert!(track.artists.is_empty());
        assert_eq!(track.cover_url(), None);
    }

    #[test]
    fn test_artist_names_and_cover() {
        let track = fixtures::track("3n3Ppam7vgaVa1iaRUc9Lp", "Wonderwall");

        assert_eq!(track.artist_names(), "Oasis");
        assert_eq!(track.cover_url(), Some("https://i.scdn.co/image/large"));
    }

    #[test]
    fn test_key_name() {
        let mut features = fixtures::audio_features("abc");
        features.key = 4;
        features.mode = 0;
        assert_eq!(features.key_name().as_deref(), Some("E minor"));

        features.key = -1;
        assert_eq!(features.key_name(), None);
    }
}
