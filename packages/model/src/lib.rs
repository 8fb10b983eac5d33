#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Swing models and the registry that serves them.
//!
//! Each model implements the [`SwingModel`] trait: a pure
//! `predict(wards, params, adjustments)` plus the parameter metadata used
//! to build its controls. Local models compute in-process; the MRP model
//! only declares its parameters and is evaluated remotely by the
//! prediction engine.
//!
//! Built-in models, in registration order:
//!
//! 1. [`uniform::UniformSwing`]: additive two-party shift.
//! 2. [`proportional::ProportionalSwing`]: multiplicative shift.
//! 3. [`demographic::DemographicSwing`]: shift chosen per ward by
//!    urban/suburban/rural classification.
//! 4. [`mrp::MrpModel`]: server-side Bayesian model (stub locally).

pub mod demographic;
pub mod mrp;
pub mod parameters;
pub mod presets;
pub mod proportional;
pub mod registry;
pub mod swing;
pub mod uniform;

use serde::Serialize;
use swing_map_election_models::{Prediction, UncertaintyBand, WardElections};
use swing_map_model_models::{ModelParameter, ModelParameters, WardAdjustments};

pub use parameters::ParameterState;
pub use presets::ScenarioPreset;
pub use registry::ModelRegistry;

/// Errors from model lookup and parameter management.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// No model is registered under the id.
    #[error("Unknown model: {id}")]
    UnknownModel {
        /// The requested model id.
        id: String,
    },

    /// No scenario preset has the id.
    #[error("Unknown scenario preset: {id}")]
    UnknownPreset {
        /// The requested preset id.
        id: String,
    },
}

/// Where a model's predictions are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// On the local prediction worker.
    Local,
    /// By the backend model service.
    Remote,
}

/// Outcome of a model's input check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// `false` when the model cannot produce meaningful output at all.
    pub valid: bool,
    /// Problems that make every prediction a placeholder.
    pub errors: Vec<String>,
    /// Per-ward problems that degrade individual predictions.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A report with no findings.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// A swing model.
///
/// Implementations are stateless; a single instance is shared by the
/// registry and the prediction worker.
pub trait SwingModel: Send + Sync {
    /// Registry key (e.g. `"uniform-swing"`).
    fn id(&self) -> &'static str;

    /// Display name.
    fn name(&self) -> &'static str;

    /// One-paragraph description.
    fn description(&self) -> &'static str;

    /// Model version string.
    fn version(&self) -> &'static str {
        "1.0.0"
    }

    /// Declared parameters, in display order.
    fn parameters(&self) -> Vec<ModelParameter>;

    /// Where predictions are computed.
    fn execution(&self) -> Execution {
        Execution::Local
    }

    /// Projects every ward. Output has one prediction per input ward, in
    /// input order; wards without usable history get
    /// [`Prediction::neutral`].
    fn predict(
        &self,
        wards: &[WardElections],
        params: &ModelParameters,
        adjustments: &WardAdjustments,
    ) -> Vec<Prediction>;

    /// Model-specific uncertainty bands, when the model has its own notion
    /// of uncertainty.
    fn uncertainty(
        &self,
        _wards: &[WardElections],
        _params: &ModelParameters,
        _predictions: &[Prediction],
    ) -> Option<Vec<UncertaintyBand>> {
        None
    }

    /// Checks whether `wards` can support a projection under `params`.
    fn validate(&self, _wards: &[WardElections], _params: &ModelParameters) -> ValidationReport {
        ValidationReport::ok()
    }
}
