#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geography roll-ups of ward predictions.
//!
//! Every level shares [`aggregate`]: predictions are grouped by a key
//! derived from ward metadata, votes are summed, and margin, share and
//! winner are computed from the summed totals. Results are recomputed in
//! full on every prediction cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use swing_map_election_models::{Prediction, WardMeta};

/// Key of the single statewide result.
pub const STATEWIDE_KEY: &str = "statewide";

/// Which party carries a geography.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Winner {
    /// Positive margin.
    Dem,
    /// Negative margin.
    Rep,
    /// Zero margin.
    Tie,
}

impl Winner {
    /// Winner implied by a margin.
    #[must_use]
    pub fn from_margin(margin: f64) -> Self {
        if margin > 0.0 {
            Self::Dem
        } else if margin < 0.0 {
            Self::Rep
        } else {
            Self::Tie
        }
    }
}

/// Summed predictions for one geography value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    /// Group key (county name or district number).
    pub key: String,
    /// Display label (e.g. `"CD-2"`).
    pub label: String,
    /// Summed Democratic votes.
    pub dem_votes: i64,
    /// Summed Republican votes.
    pub rep_votes: i64,
    /// Summed total votes.
    pub total_votes: i64,
    /// `(dem - rep) / total * 100`, or 0 without votes.
    pub margin: f64,
    /// `dem / total * 100`, or 50 without votes.
    pub dem_pct: f64,
    /// Carrying party.
    pub winner: Winner,
    /// Number of wards in the group.
    pub ward_count: usize,
}

#[derive(Default)]
struct Totals {
    dem: i64,
    rep: i64,
    total: i64,
    count: usize,
}

impl Totals {
    const fn add(&mut self, prediction: &Prediction) {
        self.dem += prediction.predicted_dem_votes;
        self.rep += prediction.predicted_rep_votes;
        self.total += prediction.predicted_total_votes;
        self.count += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn into_result(self, key: String, label: String) -> AggregatedResult {
        let (margin, dem_pct) = if self.total > 0 {
            let total = self.total as f64;
            (
                (self.dem - self.rep) as f64 / total * 100.0,
                self.dem as f64 / total * 100.0,
            )
        } else {
            (0.0, 50.0)
        };

        AggregatedResult {
            key,
            label,
            dem_votes: self.dem,
            rep_votes: self.rep,
            total_votes: self.total,
            margin,
            dem_pct,
            winner: Winner::from_margin(margin),
            ward_count: self.count,
        }
    }
}

fn sort_by_margin(results: &mut [AggregatedResult]) {
    results.sort_by(|a, b| b.margin.total_cmp(&a.margin));
}

/// Groups `predictions` by `group_fn` and sums each group.
///
/// Wards missing from `metadata`, or for which `group_fn` returns `None`,
/// are skipped. Output is sorted by margin, most Democratic first; groups
/// with equal margins keep the order in which they first appeared.
#[must_use]
pub fn aggregate<G, L>(
    predictions: &[Prediction],
    metadata: &BTreeMap<String, WardMeta>,
    group_fn: G,
    label_fn: L,
) -> Vec<AggregatedResult>
where
    G: Fn(&str, &WardMeta) -> Option<String>,
    L: Fn(&str) -> String,
{
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();
    let mut groups: Vec<(String, Totals)> = Vec::new();

    for prediction in predictions {
        let Some(meta) = metadata.get(&prediction.ward_id) else {
            continue;
        };
        let Some(key) = group_fn(&prediction.ward_id, meta) else {
            continue;
        };
        let position = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Totals::default()));
            groups.len() - 1
        });
        groups[position].1.add(prediction);
    }

    let mut results: Vec<AggregatedResult> = groups
        .into_iter()
        .map(|(key, totals)| {
            let label = label_fn(&key);
            totals.into_result(key, label)
        })
        .collect();

    sort_by_margin(&mut results);
    results
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Totals per county, labelled with the county name.
#[must_use]
pub fn by_county(
    predictions: &[Prediction],
    metadata: &BTreeMap<String, WardMeta>,
) -> Vec<AggregatedResult> {
    aggregate(
        predictions,
        metadata,
        |_, meta| non_empty(&meta.county),
        str::to_string,
    )
}

/// Totals per congressional district, labelled `CD-<n>`.
#[must_use]
pub fn by_congressional_district(
    predictions: &[Prediction],
    metadata: &BTreeMap<String, WardMeta>,
) -> Vec<AggregatedResult> {
    aggregate(
        predictions,
        metadata,
        |_, meta| non_empty(&meta.congressional_district),
        |key| format!("CD-{key}"),
    )
}

/// Totals per state senate district, labelled `SD-<n>`.
#[must_use]
pub fn by_senate_district(
    predictions: &[Prediction],
    metadata: &BTreeMap<String, WardMeta>,
) -> Vec<AggregatedResult> {
    aggregate(
        predictions,
        metadata,
        |_, meta| non_empty(&meta.state_senate_district),
        |key| format!("SD-{key}"),
    )
}

/// Totals per assembly district, labelled `AD-<n>`.
#[must_use]
pub fn by_assembly_district(
    predictions: &[Prediction],
    metadata: &BTreeMap<String, WardMeta>,
) -> Vec<AggregatedResult> {
    aggregate(
        predictions,
        metadata,
        |_, meta| non_empty(&meta.assembly_district),
        |key| format!("AD-{key}"),
    )
}

/// One result covering every prediction, with or without metadata.
#[must_use]
pub fn statewide(predictions: &[Prediction]) -> AggregatedResult {
    let mut totals = Totals::default();
    for prediction in predictions {
        totals.add(prediction);
    }
    totals.into_result(STATEWIDE_KEY.to_string(), "Wisconsin".to_string())
}
