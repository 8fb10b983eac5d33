//! Remote MRP model request and response bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use swing_map_election_models::{Prediction, RaceType, UncertaintyBand};
use swing_map_model_models::{ModelParameters, keys};

/// Model id the backend expects.
pub const MRP_MODEL_ID: &str = "mrp";

/// Parameters the remote model consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MrpParameters {
    /// Base election year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_election_year: Option<i32>,
    /// Base contest.
    pub base_race_type: String,
    /// Turnout change, in percent.
    pub turnout_change: f64,
    /// College-educated shift.
    pub college_shift: f64,
    /// Urban shift.
    pub urban_shift: f64,
    /// Rural shift.
    pub rural_shift: f64,
    /// Income-effect shift.
    pub income_shift: f64,
}

impl MrpParameters {
    /// Picks the remote fields out of a full parameter map. Missing shifts
    /// are zero.
    #[must_use]
    pub fn from_parameters(params: &ModelParameters) -> Self {
        Self {
            base_election_year: params.year(keys::BASE_ELECTION_YEAR),
            base_race_type: params.text(keys::BASE_RACE_TYPE).unwrap_or_default(),
            turnout_change: params.number_or(keys::TURNOUT_CHANGE, 0.0),
            college_shift: params.number_or(keys::COLLEGE_SHIFT, 0.0),
            urban_shift: params.number_or(keys::URBAN_SHIFT, 0.0),
            rural_shift: params.number_or(keys::RURAL_SHIFT, 0.0),
            income_shift: params.number_or(keys::INCOME_SHIFT, 0.0),
        }
    }
}

/// `POST /models/predict` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrpPredictRequest {
    /// Always [`MRP_MODEL_ID`].
    pub model_id: String,
    /// Remote model inputs.
    pub parameters: MrpParameters,
}

impl MrpPredictRequest {
    /// Builds the request for a parameter map.
    #[must_use]
    pub fn new(params: &ModelParameters) -> Self {
        Self {
            model_id: MRP_MODEL_ID.to_string(),
            parameters: MrpParameters::from_parameters(params),
        }
    }
}

/// One ward's posterior summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MrpWardPrediction {
    /// Democratic share, in percent.
    pub dem_pct: f64,
    /// Republican share, in percent.
    pub rep_pct: f64,
    /// Margin in points.
    pub margin: f64,
    /// Democratic votes (posterior mean, may be fractional).
    pub dem_votes: f64,
    /// Republican votes.
    pub rep_votes: f64,
    /// Total votes.
    pub total_votes: f64,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    /// Lower credible bound of the margin.
    pub lower_margin: f64,
    /// Upper credible bound of the margin.
    pub upper_margin: f64,
}

/// Fit details reported alongside remote predictions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MrpMetadata {
    /// Election year the model was fitted on.
    pub year: i32,
    /// Contest the model was fitted on.
    pub race_type: String,
    /// Ward boundary vintage.
    pub ward_vintage: i32,
    /// Wards in the response.
    pub ward_count: usize,
    /// Worst Gelman-Rubin statistic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_hat_max: Option<f64>,
    /// Smallest effective sample size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ess_min: Option<f64>,
    /// Posterior draws per chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draws: Option<u32>,
    /// Sampling chains.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chains: Option<u32>,
}

/// `POST /models/predict` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrpPredictionResponse {
    /// Echo of the requested model id.
    pub model_id: String,
    /// Ward id -> posterior summary.
    pub predictions: BTreeMap<String, MrpWardPrediction>,
    /// Fit details.
    #[serde(default)]
    pub metadata: MrpMetadata,
}

impl MrpPredictionResponse {
    /// Point predictions, in ward id order. Vote counts are rounded.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_predictions(&self) -> Vec<Prediction> {
        self.predictions
            .iter()
            .map(|(ward_id, p)| Prediction {
                ward_id: ward_id.clone(),
                predicted_dem_pct: p.dem_pct,
                predicted_rep_pct: p.rep_pct,
                predicted_margin: p.margin,
                predicted_dem_votes: p.dem_votes.round() as i64,
                predicted_rep_votes: p.rep_votes.round() as i64,
                predicted_total_votes: p.total_votes.round() as i64,
                confidence: p.confidence,
            })
            .collect()
    }

    /// Credible bands, in ward id order. Share bounds are derived from the
    /// margin bounds as `(margin + 100) / 2`.
    #[must_use]
    pub fn to_uncertainty(&self) -> Vec<UncertaintyBand> {
        self.predictions
            .iter()
            .map(|(ward_id, p)| UncertaintyBand {
                ward_id: ward_id.clone(),
                lower_dem_pct: (p.lower_margin + 100.0) / 2.0,
                upper_dem_pct: (p.upper_margin + 100.0) / 2.0,
                lower_margin: p.lower_margin,
                upper_margin: p.upper_margin,
            })
            .collect()
    }
}

/// Draws per chain when a fit request does not say.
pub const DEFAULT_FIT_DRAWS: u32 = 2000;

/// Tuning steps per chain when a fit request does not say.
pub const DEFAULT_FIT_TUNE: u32 = 1000;

/// Sampler diagnostics recorded with a fitted model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    #[serde(default)]
    pub r_hat_max: Option<f64>,
    #[serde(default)]
    pub ess_min: Option<f64>,
    #[serde(default)]
    pub draws: Option<u32>,
    #[serde(default)]
    pub chains: Option<u32>,
}

/// A model the backend has fitted and can predict with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub race_type: RaceType,
    pub year: i32,
    pub ward_vintage: u16,
    #[serde(default)]
    pub fitted_at: Option<String>,
    #[serde(default)]
    pub diagnostics: FitDiagnostics,
    pub filename: String,
}

/// Body of `GET /models/mrp/fitted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittedModelsResponse {
    #[serde(default)]
    pub models: Vec<FittedModel>,
}

/// Body of `POST /models/mrp/fit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrpFitRequest {
    pub year: i32,
    pub race_type: RaceType,
    pub draws: u32,
    pub tune: u32,
}

impl MrpFitRequest {
    /// A fit of `(year, race_type)` with the default sampler settings.
    #[must_use]
    pub const fn new(year: i32, race_type: RaceType) -> Self {
        Self {
            year,
            race_type,
            draws: DEFAULT_FIT_DRAWS,
            tune: DEFAULT_FIT_TUNE,
        }
    }

    #[must_use]
    pub const fn with_draws(mut self, draws: u32, tune: u32) -> Self {
        self.draws = draws;
        self.tune = tune;
        self
    }
}

/// The background task started by a fit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrpFitTask {
    pub task_id: String,
}

/// Lifecycle of a background fit task.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum FitTaskStatus {
    Pending,
    Started,
    Progress,
    Success,
    Failure,
    Retry,
}

impl FitTaskStatus {
    /// Whether the task will not change state again.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Progress reported while a fit runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitProgress {
    pub step: String,
    #[serde(default)]
    pub ward_count: Option<usize>,
}

/// Body of `GET /models/mrp/fit/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitStatus {
    pub task_id: String,
    pub status: FitTaskStatus,
    /// Task result on success; its shape is up to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<FitProgress>,
}
