//! Track search query and result models.

use serde::{Deserialize, Serialize};

use super::track::Track;
use crate::errors::{SpotifyError, SpotifyResult};

/// Largest page size the search endpoint accepts.
pub const MAX_SEARCH_LIMIT: u32 = 50;

/// Largest offset the search endpoint accepts.
pub const MAX_SEARCH_OFFSET: u32 = 1000;

/// A page of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Page size requested.
    #[serde(default)]
    pub limit: u32,
    /// Offset of the first item.
    #[serde(default)]
    pub offset: u32,
    /// Total number of matches.
    #[serde(default)]
    pub total: u32,
    /// URL of the next page.
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> Paging<T> {
    /// Returns true if another page is available.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Response of the search endpoint restricted to tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching tracks.
    pub tracks: Paging<Track>,
}

/// Track search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text query, may use Spotify field filters such as `artist:`.
    pub q: String,
    /// Page size (1 to 50).
    pub limit: u32,
    /// Offset of the first result (0 to 1000).
    pub offset: u32,
    /// ISO 3166-1 alpha-2 market code.
    pub market: Option<String>,
}

impl SearchQuery {
    /// Creates a query with the default page size of 20.
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            limit: 20,
            offset: 0,
            market: None,
        }
    }

    /// Builds a query using `track:` and `artist:` field filters.
    pub fn track_by_artist(title: &str, artist: &str) -> Self {
        Self::new(format!("track:{} artist:{}", title.trim(), artist.trim()))
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the offset.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Restricts results to a market.
    pub fn market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    /// Validates the parameters.
    pub fn validate(&self) -> SpotifyResult<()> {
        if self.q.trim().is_empty() {
            return Err(SpotifyError::validation_param("Search query is required", "q"));
        }
        if !(1..=MAX_SEARCH_LIMIT).contains(&self.limit) {
            return Err(SpotifyError::validation_param(
                format!("Limit must be between 1 and {MAX_SEARCH_LIMIT}"),
                "limit",
            ));
        }
        if self.offset > MAX_SEARCH_OFFSET {
            return Err(SpotifyError::validation_param(
                format!("Offset must not exceed {MAX_SEARCH_OFFSET}"),
                "offset",
            ));
        }
        if let Some(market) = &self.market {
            if market.len() != 2 || !market.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(SpotifyError::validation_param(
                    "Market must be a two-letter country code",
                    "market",
                ));
            }
        }
        Ok(())
    }

    /// Query string pairs for the search endpoint.
    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", self.q.trim().to_string()),
            ("type", "track".to_string()),
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(market) = &self.market {
            params.push(("market", market.to_ascii_uppercase()));
        }
        params
    }
}

impl From<&str> for SearchQuery {
    fn from(q: &str) -> Self {
        Self::new(q)
    }
}

impl From<String> for SearchQuery {
    fn from(q: String) -> Self {
        Self::new(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query = SearchQuery::new("wonderwall");
        assert_eq!(query.limit, 20);
        assert_eq!(query.offset, 0);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(SearchQuery::new("   ").validate().is_err());
        assert!(SearchQuery::new("x").limit(0).validate().is_err());
        assert!(SearchQuery::new("x").limit(51).validate().is_err());
        assert!(SearchQuery::new("x").limit(50).validate().is_ok());
        assert!(SearchQuery::new("x").offset(1001).validate().is_err());
        assert!(SearchQuery::new("x").market("USA").validate().is_err());
        assert!(SearchQuery::new("x").market("us").validate().is_ok());
    }

    #[test]
    fn test_params() {
        let params = SearchQuery::track_by_artist("Blackbird ", "The Beatles")
            .limit(5)
            .market("gb")
            .to_params();

        assert_eq!(
            params,
            vec![
                ("q", "track:Blackbird artist:The Beatles".to_string()),
                ("type", "track".to_string()),
                ("limit", "5".to_string()),
                ("offset", "0".to_string()),
                ("market", "GB".to_string()),
            ]
        );
    }
}
