//! HTTP client for the election backend.
//!
//! Ward history comes from `elections/map-data/{year}/{race}` and ward
//! geography from `wards/boundaries`.

use std::collections::BTreeMap;

use swing_map_election_models::{MapDataResponse, RaceType, WardMeta};

use crate::{WardHistoryError, WardHistoryStore, boundaries};

/// Fetches ward history, boundaries and map data from the backend API.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Creates a client for the API rooted at `base_url`
    /// (e.g. `http://localhost:8000/api/v1`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing connection pool.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// API root, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_text(&self, url: &str) -> Result<String, WardHistoryError> {
        log::debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WardHistoryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// One election's results for every ward.
    ///
    /// # Errors
    ///
    /// Returns [`WardHistoryError`] if the request fails, the status is not
    /// successful, or the body is not a map-data response.
    pub async fn map_data(
        &self,
        year: i32,
        race_type: RaceType,
    ) -> Result<MapDataResponse, WardHistoryError> {
        let url = self.url(&format!("elections/map-data/{year}/{race_type}"));
        let body = self.get_text(&url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Ward geography from the boundary `GeoJSON` of a given vintage.
    ///
    /// # Errors
    ///
    /// Returns [`WardHistoryError`] if the request fails or the body is not
    /// a `GeoJSON` feature collection.
    pub async fn ward_boundaries(
        &self,
        vintage: u16,
    ) -> Result<BTreeMap<String, WardMeta>, WardHistoryError> {
        let url = self.url(&format!("wards/boundaries?vintage={vintage}"));
        let body = self.get_text(&url).await?;
        boundaries::parse_boundaries(&body)
    }

    /// Loads one election's results as the ward history, then attaches
    /// boundary geography of `vintage`.
    ///
    /// # Errors
    ///
    /// Returns [`WardHistoryError`] if either request fails.
    pub async fn load_store(
        &self,
        year: i32,
        race_type: RaceType,
        vintage: u16,
    ) -> Result<WardHistoryStore, WardHistoryError> {
        let map_data = self.map_data(year, race_type).await?;
        let metadata = self.ward_boundaries(vintage).await?;
        Ok(WardHistoryStore::from_map_data(&map_data).with_metadata(metadata))
    }
}
