//! What gets painted: one color-attribute record per ward, plus the
//! change detection used to skip redundant repaints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};
use swing_map_election_models::{MapDataResponse, Prediction, RaceType};

use crate::store::FeatureState;

/// Color attribute keys written for every ward of a layer.
pub const COLOR_KEYS: [&str; 5] = ["demPct", "repPct", "margin", "totalVotes", "isEstimate"];

/// Wards compared by [`ChangeDetection::Sampled`] unless configured
/// otherwise.
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Color attributes of one ward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapWardState {
    pub ward_id: String,
    pub dem_pct: f64,
    pub rep_pct: f64,
    pub margin: f64,
    pub total_votes: f64,
    pub is_estimate: bool,
}

impl MapWardState {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_prediction(prediction: &Prediction, is_estimate: bool) -> Self {
        Self {
            ward_id: prediction.ward_id.clone(),
            dem_pct: prediction.predicted_dem_pct,
            rep_pct: prediction.predicted_rep_pct,
            margin: prediction.predicted_margin,
            total_votes: prediction.predicted_total_votes as f64,
            is_estimate,
        }
    }

    /// The attribute bag written to the feature-state store.
    #[must_use]
    pub fn to_feature_state(&self) -> FeatureState {
        let mut state = FeatureState::new();
        state.insert("demPct".to_string(), Value::from(self.dem_pct));
        state.insert("repPct".to_string(), Value::from(self.rep_pct));
        state.insert("margin".to_string(), Value::from(self.margin));
        state.insert("totalVotes".to_string(), Value::from(self.total_votes));
        state.insert("isEstimate".to_string(), Value::from(self.is_estimate));
        state
    }
}

/// A full set of ward colors for one election or prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayer {
    /// Election year the layer shows (the base year for predictions).
    pub year: Option<i32>,
    /// Contest the layer shows.
    pub race_type: Option<RaceType>,
    pub wards: Vec<MapWardState>,
}

impl MapLayer {
    /// Layer for a prediction set projected from `(year, race_type)`.
    /// `is_estimate` tells whether a ward's base result was estimated.
    #[must_use]
    pub fn from_predictions(
        predictions: &[Prediction],
        year: Option<i32>,
        race_type: Option<RaceType>,
        is_estimate: impl Fn(&str) -> bool,
    ) -> Self {
        Self {
            year,
            race_type,
            wards: predictions
                .iter()
                .map(|p| MapWardState::from_prediction(p, is_estimate(&p.ward_id)))
                .collect(),
        }
    }

    /// Layer for a historical map-data response.
    #[must_use]
    pub fn from_map_data(response: &MapDataResponse) -> Self {
        Self {
            year: Some(response.year),
            race_type: Some(response.race_type),
            wards: response
                .data
                .iter()
                .map(|(ward_id, entry)| MapWardState {
                    ward_id: ward_id.clone(),
                    dem_pct: entry.dem_pct,
                    rep_pct: entry.rep_pct,
                    margin: entry.margin,
                    total_votes: entry.total_votes,
                    is_estimate: entry.is_estimate,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.wards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wards.is_empty()
    }
}

/// How a new layer is compared with the one already painted.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeDetection {
    /// Same ward count, same election, and up to `sample_size` evenly
    /// spaced wards with equal `demPct` and `margin`. Can miss changes
    /// confined to unsampled wards.
    #[default]
    Sampled,
    /// Every ward compared.
    Exact,
}

impl ChangeDetection {
    /// Whether `next` differs from `previous`.
    #[must_use]
    pub fn changed(self, previous: &MapLayer, next: &MapLayer, sample_size: usize) -> bool {
        if previous.len() != next.len()
            || previous.year != next.year
            || previous.race_type != next.race_type
        {
            return true;
        }

        match self {
            Self::Exact => previous.wards != next.wards,
            Self::Sampled => sample_indices(next.len(), sample_size)
                .any(|i| ward_differs(&previous.wards[i], &next.wards[i])),
        }
    }
}

fn ward_differs(a: &MapWardState, b: &MapWardState) -> bool {
    a.ward_id != b.ward_id
        || a.dem_pct.total_cmp(&b.dem_pct).is_ne()
        || a.margin.total_cmp(&b.margin).is_ne()
}

/// Up to `samples` evenly spaced indices into a list of `len` items.
fn sample_indices(len: usize, samples: usize) -> impl Iterator<Item = usize> {
    let count = samples.min(len);
    let step = if count == 0 { 1 } else { len / count };
    (0..count).map(move |i| i * step)
}
