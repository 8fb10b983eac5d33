#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward election history for a modeling session.
//!
//! [`WardHistoryStore`] is loaded once and is read-only afterwards. It
//! holds every ward's record, the geography metadata used for
//! aggregation, and a cached, shareable copy of the reduced payload sent
//! to the prediction worker.

pub mod boundaries;
pub mod client;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use swing_map_election_models::{
    ElectionRecord, MapDataResponse, RaceType, Region, WardElections, WardMeta, WardRecord,
    build_ward_region_map,
};

pub use boundaries::{extract_ward_metadata, parse_boundaries};
pub use client::BackendClient;

/// Errors from loading ward history or boundaries.
#[derive(Debug, thiserror::Error)]
pub enum WardHistoryError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// JSON parse error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The boundary payload is not valid `GeoJSON`.
    #[error("GeoJSON parse error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The boundary payload is valid `GeoJSON` but not a feature collection.
    #[error("Ward boundaries must be a FeatureCollection")]
    NotFeatureCollection,
}

/// Read-only ward history for one session.
#[derive(Debug, Clone)]
pub struct WardHistoryStore {
    records: Vec<WardRecord>,
    index: BTreeMap<String, usize>,
    metadata: BTreeMap<String, WardMeta>,
    payload: Arc<[WardElections]>,
}

impl WardHistoryStore {
    /// Builds the store from full ward records.
    ///
    /// Elections are ordered by year. A ward id seen twice keeps its first
    /// record. Records carrying non-empty geography contribute metadata.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = WardRecord>) -> Self {
        let mut kept = Vec::new();
        let mut index = BTreeMap::new();
        let mut metadata = BTreeMap::new();

        for mut record in records {
            if index.contains_key(&record.ward_id) {
                log::warn!("Duplicate ward {} in history; keeping the first", record.ward_id);
                continue;
            }
            record.elections.sort_by_key(|e| e.year);
            if record.meta != WardMeta::default() {
                metadata.insert(record.ward_id.clone(), record.meta.clone());
            }
            index.insert(record.ward_id.clone(), kept.len());
            kept.push(record);
        }

        let payload: Arc<[WardElections]> = kept.iter().map(WardRecord::to_elections).collect();

        log::info!("Loaded election history for {} wards", kept.len());

        Self {
            records: kept,
            index,
            metadata,
            payload,
        }
    }

    /// Parses a JSON array of ward records.
    ///
    /// # Errors
    ///
    /// Returns [`WardHistoryError::Json`] if the text is not a valid
    /// ward record array.
    pub fn from_json(json: &str) -> Result<Self, WardHistoryError> {
        let records: Vec<WardRecord> = serde_json::from_str(json)?;
        Ok(Self::from_records(records))
    }

    /// Builds single-election records from a map-data response. Other
    /// votes are whatever the total leaves after the two parties.
    #[must_use]
    pub fn from_map_data(response: &MapDataResponse) -> Self {
        Self::from_records(response.data.iter().map(|(ward_id, entry)| WardRecord {
            ward_id: ward_id.clone(),
            ward_name: String::new(),
            meta: WardMeta::default(),
            elections: vec![ElectionRecord {
                year: response.year,
                race_type: response.race_type,
                dem_votes: entry.dem_votes,
                rep_votes: entry.rep_votes,
                other_votes: entry.total_votes - entry.dem_votes - entry.rep_votes,
                total_votes: entry.total_votes,
                dem_pct: entry.dem_pct,
                rep_pct: entry.rep_pct,
                margin: entry.margin,
                is_estimate: entry.is_estimate,
            }],
        }))
    }

    /// Attaches boundary metadata, replacing any a record already carried.
    ///
    /// Metadata for wards without history is kept; aggregation only looks
    /// up wards that have predictions.
    #[must_use]
    pub fn with_metadata(mut self, metadata: BTreeMap<String, WardMeta>) -> Self {
        for (ward_id, meta) in metadata {
            if let Some(&i) = self.index.get(&ward_id) {
                self.records[i].meta = meta.clone();
            }
            self.metadata.insert(ward_id, meta);
        }
        self
    }

    /// The record for `ward_id`.
    #[must_use]
    pub fn get(&self, ward_id: &str) -> Option<&WardRecord> {
        self.index.get(ward_id).map(|&i| &self.records[i])
    }

    /// The worker-payload entry for `ward_id`.
    #[must_use]
    pub fn elections(&self, ward_id: &str) -> Option<&WardElections> {
        self.index.get(ward_id).map(|&i| &self.payload[i])
    }

    /// Number of wards with history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no ward has history.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ward ids in load order.
    pub fn ward_ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.ward_id.as_str())
    }

    /// Ward id -> geography.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, WardMeta> {
        &self.metadata
    }

    /// The worker payload: ward id and elections only. Cheap to clone;
    /// every request shares the same allocation.
    #[must_use]
    pub fn worker_payload(&self) -> Arc<[WardElections]> {
        Arc::clone(&self.payload)
    }

    /// Ward id -> region, from each ward's county.
    #[must_use]
    pub fn region_map(&self) -> BTreeMap<String, Region> {
        build_ward_region_map(&self.metadata)
    }

    /// Every distinct `(year, race)` present in the history, oldest first.
    #[must_use]
    pub fn available_elections(&self) -> Vec<(i32, RaceType)> {
        self.records
            .iter()
            .flat_map(|r| r.elections.iter().map(|e| (e.year, e.race_type)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
