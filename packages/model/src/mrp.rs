//! Multilevel regression with poststratification.
//!
//! Inference runs on the backend. This model only declares the parameters
//! the remote call consumes; its local `predict` returns nothing.

use swing_map_election_models::{Prediction, WardElections};
use swing_map_model_models::{ModelParameter, ModelParameters, WardAdjustments, keys};

use crate::swing;
use crate::{Execution, SwingModel};

/// Registry id, also the `model_id` sent to the backend.
pub const ID: &str = "mrp";

/// Server-side Bayesian model.
#[derive(Debug, Default, Clone, Copy)]
pub struct MrpModel;

fn shift_slider(id: &str, label: &str, description: &str) -> ModelParameter {
    ModelParameter::slider(id, label, (-10.0, 10.0, 0.5), 0.0)
        .describe(description)
        .in_group("demographic")
}

impl SwingModel for MrpModel {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "MRP (Bayesian)"
    }

    fn description(&self) -> &'static str {
        "Multilevel regression with poststratification. Uses demographics and geographic random effects for ward-level predictions with Bayesian credible intervals."
    }

    fn parameters(&self) -> Vec<ModelParameter> {
        let mut params = swing::base_parameters();
        params.extend([
            swing::turnout_parameter().in_group("adjustments"),
            shift_slider(
                keys::COLLEGE_SHIFT,
                "College-Educated Shift",
                "Shift in vote margin among college-educated areas (D+)",
            ),
            shift_slider(
                keys::URBAN_SHIFT,
                "Urban Shift",
                "Shift in vote margin in urban areas (>3,000/sq mi)",
            ),
            shift_slider(
                keys::RURAL_SHIFT,
                "Rural Shift",
                "Shift in vote margin in rural areas (<500/sq mi)",
            ),
            shift_slider(
                keys::INCOME_SHIFT,
                "Income Effect Shift",
                "Shift in income coefficient effect on vote share",
            ),
        ]);
        params
    }

    fn execution(&self) -> Execution {
        Execution::Remote
    }

    fn predict(
        &self,
        _wards: &[WardElections],
        _params: &ModelParameters,
        _adjustments: &WardAdjustments,
    ) -> Vec<Prediction> {
        Vec::new()
    }
}
