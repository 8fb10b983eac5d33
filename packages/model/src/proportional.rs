//! Proportional swing: the Democratic two-party share is scaled rather
//! than shifted, so wards with stronger base support move further in
//! absolute points.

use swing_map_election_models::{Prediction, UncertaintyBand, WardElections};
use swing_map_model_models::{ModelParameter, ModelParameters, WardAdjustments, keys};

use crate::swing::{self, BaseSelection, ShareShift};
use crate::{SwingModel, ValidationReport};

/// Registry id.
pub const ID: &str = "proportional-swing";

const CONFIDENCE: f64 = 0.6;

/// Multiplicative two-party swing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProportionalSwing;

impl SwingModel for ProportionalSwing {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "Proportional Swing"
    }

    fn description(&self) -> &'static str {
        "Applies a multiplicative vote share adjustment. Wards with higher base support shift more in absolute terms."
    }

    fn parameters(&self) -> Vec<ModelParameter> {
        let mut params = swing::base_parameters();
        params.push(
            ModelParameter::slider(
                keys::SWING_POINTS,
                "Statewide Swing (D+)",
                (-15.0, 15.0, 0.1),
                0.0,
            )
            .describe("Positive = more Democratic, Negative = more Republican"),
        );
        params.push(swing::turnout_parameter());
        params
    }

    fn predict(
        &self,
        wards: &[WardElections],
        params: &ModelParameters,
        adjustments: &WardAdjustments,
    ) -> Vec<Prediction> {
        let selection = BaseSelection::from_params(params);
        let swing_points = params.number_or(keys::SWING_POINTS, 0.0);

        wards
            .iter()
            .map(|ward| {
                let Some(base) = selection.base_for(ward) else {
                    return Prediction::neutral(&ward.ward_id);
                };
                let points = adjustments.effective_swing(&ward.ward_id, swing_points);
                let turnout =
                    adjustments.effective_turnout(&ward.ward_id, selection.turnout_change);

                swing::project(
                    &ward.ward_id,
                    base,
                    ShareShift::Multiplicative(points),
                    turnout,
                    CONFIDENCE,
                )
            })
            .collect()
    }

    fn uncertainty(
        &self,
        wards: &[WardElections],
        params: &ModelParameters,
        predictions: &[Prediction],
    ) -> Option<Vec<UncertaintyBand>> {
        swing::historical_uncertainty(wards, params, predictions)
    }

    fn validate(&self, wards: &[WardElections], params: &ModelParameters) -> ValidationReport {
        swing::validate_history(wards, params)
    }
}
