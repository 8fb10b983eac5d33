#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward-level election history, prediction, and geography types.
//!
//! These are the value types shared by every stage of the swing modeler:
//! the historical records loaded once per session, the per-ward
//! predictions regenerated on every parameter change, and the uncertainty
//! bands derived from them. Field names serialize in `camelCase` to match
//! the backend and the local computation channel.

pub mod region;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use region::{Region, build_ward_region_map};

/// The contest an election record belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RaceType {
    /// President of the United States.
    President,
    /// Governor of Wisconsin.
    Governor,
    /// United States Senate.
    UsSenate,
    /// United States House of Representatives.
    UsHouse,
    /// Wisconsin State Senate.
    StateSenate,
    /// Wisconsin State Assembly.
    StateAssembly,
    /// Wisconsin Attorney General.
    AttorneyGeneral,
    /// Wisconsin Secretary of State.
    SecretaryOfState,
    /// Wisconsin State Treasurer.
    Treasurer,
}

/// A single historical election result for one ward.
///
/// `dem_votes + rep_votes + other_votes == total_votes` is expected but not
/// enforced: disaggregated estimates can drift and are kept as reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionRecord {
    /// Election year.
    pub year: i32,
    /// Contest type.
    pub race_type: RaceType,
    /// Democratic votes. Fractional for disaggregated estimates.
    pub dem_votes: f64,
    /// Republican votes.
    pub rep_votes: f64,
    /// Votes for all other candidates.
    pub other_votes: f64,
    /// Total votes cast in the contest.
    pub total_votes: f64,
    /// Democratic share of the total, in percent.
    pub dem_pct: f64,
    /// Republican share of the total, in percent.
    pub rep_pct: f64,
    /// `(dem - rep) / total * 100`; positive = Democratic-leaning.
    pub margin: f64,
    /// Whether the record was disaggregated from a larger reporting unit.
    pub is_estimate: bool,
}

impl ElectionRecord {
    /// Builds a record from raw vote counts, deriving the percentages and
    /// margin. A zero total yields zero percentages and margin.
    #[must_use]
    pub fn from_votes(
        year: i32,
        race_type: RaceType,
        dem_votes: f64,
        rep_votes: f64,
        other_votes: f64,
    ) -> Self {
        let total_votes = dem_votes + rep_votes + other_votes;
        let (dem_pct, rep_pct, margin) = if total_votes > 0.0 {
            (
                dem_votes / total_votes * 100.0,
                rep_votes / total_votes * 100.0,
                (dem_votes - rep_votes) / total_votes * 100.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        Self {
            year,
            race_type,
            dem_votes,
            rep_votes,
            other_votes,
            total_votes,
            dem_pct,
            rep_pct,
            margin,
            is_estimate: false,
        }
    }

    /// Marks the record as a disaggregated estimate.
    #[must_use]
    pub const fn estimated(mut self) -> Self {
        self.is_estimate = true;
        self
    }

    /// Democratic plus Republican votes.
    #[must_use]
    pub fn two_party_votes(&self) -> f64 {
        self.dem_votes + self.rep_votes
    }

    /// Difference between the reported total and the sum of its parts.
    #[must_use]
    pub fn vote_sum_discrepancy(&self) -> f64 {
        self.total_votes - (self.dem_votes + self.rep_votes + self.other_votes)
    }
}

/// Geography metadata attached to a ward boundary.
///
/// Empty strings mean the boundary did not carry that attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WardMeta {
    /// County name (e.g. "DANE").
    pub county: String,
    /// Municipality name (e.g. "CITY OF MADISON").
    pub municipality: String,
    /// Congressional district number.
    pub congressional_district: String,
    /// State senate district number.
    pub state_senate_district: String,
    /// State assembly district number.
    pub assembly_district: String,
}

/// A ward with its geography and full election history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardRecord {
    /// Stable ward identifier, also the rendered feature id.
    pub ward_id: String,
    /// Display name of the ward.
    #[serde(default)]
    pub ward_name: String,
    /// Geography metadata.
    #[serde(flatten)]
    pub meta: WardMeta,
    /// Election history ordered by year.
    #[serde(default)]
    pub elections: Vec<ElectionRecord>,
}

impl WardRecord {
    /// Reduces the record to the shape the prediction worker needs.
    #[must_use]
    pub fn to_elections(&self) -> WardElections {
        WardElections {
            ward_id: self.ward_id.clone(),
            elections: self.elections.clone(),
        }
    }
}

/// The minimal per-ward payload sent to the prediction worker: the id and
/// the election history, with geography stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardElections {
    /// Ward identifier.
    pub ward_id: String,
    /// Election history ordered by year.
    pub elections: Vec<ElectionRecord>,
}

impl WardElections {
    /// Iterates over the elections of one contest type.
    pub fn elections_of(&self, race_type: RaceType) -> impl Iterator<Item = &ElectionRecord> {
        self.elections
            .iter()
            .filter(move |e| e.race_type == race_type)
    }
}

/// Density classification used by the demographic swing model.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    /// More than 3,000 people per square mile.
    Urban,
    /// 500 to 3,000 people per square mile.
    Suburban,
    /// Fewer than 500 people per square mile. Assumed when unknown.
    #[default]
    Rural,
}

/// A projected result for one ward, regenerated on every computation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Ward identifier.
    pub ward_id: String,
    /// Projected Democratic share of the total, in percent.
    pub predicted_dem_pct: f64,
    /// Projected Republican share of the total, in percent.
    pub predicted_rep_pct: f64,
    /// Projected margin in points; positive = Democratic.
    pub predicted_margin: f64,
    /// Projected Democratic votes.
    pub predicted_dem_votes: i64,
    /// Projected Republican votes.
    pub predicted_rep_votes: i64,
    /// Projected total votes.
    pub predicted_total_votes: i64,
    /// Coarse model reliability in `[0, 1]`.
    pub confidence: f64,
}

impl Prediction {
    /// The placeholder emitted when a ward has no usable base election:
    /// an even split with no votes and zero confidence.
    #[must_use]
    pub fn neutral(ward_id: impl Into<String>) -> Self {
        Self {
            ward_id: ward_id.into(),
            predicted_dem_pct: 50.0,
            predicted_rep_pct: 50.0,
            predicted_margin: 0.0,
            predicted_dem_votes: 0,
            predicted_rep_votes: 0,
            predicted_total_votes: 0,
            confidence: 0.0,
        }
    }
}

/// Confidence interval around a [`Prediction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UncertaintyBand {
    /// Ward identifier.
    pub ward_id: String,
    /// Lower bound of the Democratic share, in percent.
    pub lower_dem_pct: f64,
    /// Upper bound of the Democratic share, in percent.
    pub upper_dem_pct: f64,
    /// Lower bound of the margin, in points.
    pub lower_margin: f64,
    /// Upper bound of the margin, in points.
    pub upper_margin: f64,
}

impl UncertaintyBand {
    /// The widest possible band, used for wards without a prediction.
    #[must_use]
    pub fn maximal(ward_id: impl Into<String>) -> Self {
        Self {
            ward_id: ward_id.into(),
            lower_dem_pct: 0.0,
            upper_dem_pct: 100.0,
            lower_margin: -100.0,
            upper_margin: 100.0,
        }
    }

    /// Width of the Democratic share interval, in points.
    #[must_use]
    pub fn dem_pct_width(&self) -> f64 {
        self.upper_dem_pct - self.lower_dem_pct
    }
}

/// One ward's entry in a backend map-data response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardMapEntry {
    /// Democratic share, in percent.
    pub dem_pct: f64,
    /// Republican share, in percent.
    pub rep_pct: f64,
    /// Margin in points.
    pub margin: f64,
    /// Total votes.
    pub total_votes: f64,
    /// Democratic votes.
    pub dem_votes: f64,
    /// Republican votes.
    pub rep_votes: f64,
    /// Whether the entry is a disaggregated estimate.
    pub is_estimate: bool,
}

/// Backend response carrying a single election for every ward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDataResponse {
    /// Election year.
    pub year: i32,
    /// Contest type.
    pub race_type: RaceType,
    /// Number of wards in `data`.
    pub ward_count: usize,
    /// Ward id -> result.
    pub data: BTreeMap<String, WardMapEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn race_type_uses_snake_case_everywhere() {
        assert_eq!(RaceType::UsSenate.to_string(), "us_senate");
        assert_eq!(
            RaceType::from_str("state_assembly").unwrap(),
            RaceType::StateAssembly
        );
        assert_eq!(
            serde_json::to_string(&RaceType::SecretaryOfState).unwrap(),
            "\"secretary_of_state\""
        );
    }

    #[test]
    fn from_votes_derives_margin() {
        let record = ElectionRecord::from_votes(2024, RaceType::President, 600.0, 400.0, 0.0);
        assert!((record.dem_pct - 60.0).abs() < 1e-9);
        assert!((record.margin - 20.0).abs() < 1e-9);
        assert!(record.vote_sum_discrepancy().abs() < f64::EPSILON);
    }

    #[test]
    fn from_votes_zero_total_is_flat() {
        let record = ElectionRecord::from_votes(2020, RaceType::Governor, 0.0, 0.0, 0.0);
        assert!(record.margin.abs() < f64::EPSILON);
        assert!(record.dem_pct.abs() < f64::EPSILON);
    }

    #[test]
    fn ward_record_reads_flattened_metadata() {
        let json = r#"{
            "wardId": "55025-001",
            "county": "DANE",
            "municipality": "CITY OF MADISON",
            "congressionalDistrict": "2",
            "stateSenateDistrict": "26",
            "assemblyDistrict": "77",
            "elections": [{
                "year": 2024, "raceType": "president",
                "demVotes": 600, "repVotes": 400, "otherVotes": 0, "totalVotes": 1000,
                "demPct": 60, "repPct": 40, "margin": 20, "isEstimate": false
            }]
        }"#;

        let ward: WardRecord = serde_json::from_str(json).unwrap();
        assert_eq!(ward.meta.county, "DANE");
        assert_eq!(ward.meta.assembly_district, "77");
        assert_eq!(ward.elections.len(), 1);

        let reduced = ward.to_elections();
        assert_eq!(reduced.ward_id, "55025-001");
        assert_eq!(reduced.elections_of(RaceType::President).count(), 1);
        assert_eq!(reduced.elections_of(RaceType::Governor).count(), 0);
    }

    #[test]
    fn prediction_serializes_field_names_for_the_channel() {
        let value = serde_json::to_value(Prediction::neutral("w1")).unwrap();
        for key in [
            "wardId",
            "predictedDemPct",
            "predictedRepPct",
            "predictedMargin",
            "predictedDemVotes",
            "predictedRepVotes",
            "predictedTotalVotes",
            "confidence",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn classification_defaults_to_rural() {
        assert_eq!(Classification::default(), Classification::Rural);
        assert_eq!(
            Classification::from_str("suburban").unwrap(),
            Classification::Suburban
        );
    }
}
