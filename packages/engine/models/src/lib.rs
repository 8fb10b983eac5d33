#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Messages exchanged by the prediction engine.
//!
//! The local channel carries [`WorkerRequest`] to the prediction worker and
//! [`WorkerResponse`] back. Field names serialize exactly as the channel
//! contract names them. The remote channel types live in [`mrp`].

pub mod config;
pub mod mrp;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use swing_map_election_models::{Prediction, UncertaintyBand, WardElections};
use swing_map_model_models::{ModelParameters, WardAdjustments, keys};

pub use config::EngineConfig;
pub use mrp::{
    FitStatus, FitTaskStatus, FittedModel, FittedModelsResponse, MrpFitRequest, MrpFitTask,
    MrpMetadata, MrpParameters, MrpPredictRequest, MrpPredictionResponse,
};

/// The parameter subset the local models read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerParams {
    /// Base election year, as text (e.g. `"2024"`).
    pub base_election_year: String,
    /// Base contest (e.g. `"president"`).
    pub base_race_type: String,
    /// Statewide swing toward Democrats, in points.
    pub swing_points: f64,
    /// Statewide turnout change, in percent.
    pub turnout_change: f64,
    /// Demographic model: urban swing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urban_swing: Option<f64>,
    /// Demographic model: suburban swing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suburban_swing: Option<f64>,
    /// Demographic model: rural swing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rural_swing: Option<f64>,
}

impl WorkerParams {
    /// Picks the channel fields out of a full parameter map. Missing
    /// numbers default to zero; the classification swings stay absent.
    #[must_use]
    pub fn from_parameters(params: &ModelParameters) -> Self {
        Self {
            base_election_year: params.text(keys::BASE_ELECTION_YEAR).unwrap_or_default(),
            base_race_type: params.text(keys::BASE_RACE_TYPE).unwrap_or_default(),
            swing_points: params.number_or(keys::SWING_POINTS, 0.0),
            turnout_change: params.number_or(keys::TURNOUT_CHANGE, 0.0),
            urban_swing: params.number(keys::URBAN_SWING),
            suburban_swing: params.number(keys::SUBURBAN_SWING),
            rural_swing: params.number(keys::RURAL_SWING),
        }
    }

    /// Expands back into a parameter map a model can read.
    #[must_use]
    pub fn to_parameters(&self) -> ModelParameters {
        let mut params = ModelParameters::new()
            .with(keys::BASE_ELECTION_YEAR, self.base_election_year.as_str())
            .with(keys::BASE_RACE_TYPE, self.base_race_type.as_str())
            .with(keys::SWING_POINTS, self.swing_points)
            .with(keys::TURNOUT_CHANGE, self.turnout_change);

        for (key, value) in [
            (keys::URBAN_SWING, self.urban_swing),
            (keys::SUBURBAN_SWING, self.suburban_swing),
            (keys::RURAL_SWING, self.rural_swing),
        ] {
            if let Some(value) = value {
                params.set(key, value);
            }
        }
        params
    }
}

/// A request for one local computation.
///
/// The ward payload is shared, so building a request never copies the
/// election history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    /// Ward ids and election history, geography stripped.
    pub ward_data: Arc<[WardElections]>,
    /// Parameters read by the local models.
    pub params: WorkerParams,
    /// Registry id of the model to run.
    pub model_type: String,
    /// Region and classification tables, flattened into the message.
    #[serde(flatten)]
    pub adjustments: WardAdjustments,
    /// Whether to compute uncertainty bands too.
    pub compute_uncertainty: bool,
}

/// The worker's answer to a [`WorkerRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    /// One prediction per ward, in request order.
    pub predictions: Vec<Prediction>,
    /// Present when uncertainty was requested and the model supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<Vec<UncertaintyBand>>,
}

/// A completed computation, published by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionOutput {
    /// Request generation this output answers.
    pub generation: u64,
    /// Model that produced it.
    pub model_id: String,
    /// Per-ward predictions.
    pub predictions: Vec<Prediction>,
    /// Per-ward uncertainty bands, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<Vec<UncertaintyBand>>,
    /// Fit details, for remote model output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_metadata: Option<MrpMetadata>,
}
