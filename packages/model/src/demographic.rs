//! Demographic swing: each ward's additive swing comes from its
//! urban/suburban/rural classification.

use swing_map_election_models::{Classification, Prediction, UncertaintyBand, WardElections};
use swing_map_model_models::{ModelParameter, ModelParameters, WardAdjustments, keys};

use crate::swing::{self, BaseSelection, ShareShift};
use crate::{SwingModel, ValidationReport};

/// Registry id.
pub const ID: &str = "demographic-swing";

// Lower than uniform: depends on classification accuracy.
const CONFIDENCE: f64 = 0.5;

/// Per-classification additive swing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemographicSwing;

/// The three classification swings read from a parameter set.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClassSwings {
    urban: f64,
    suburban: f64,
    rural: f64,
}

impl ClassSwings {
    fn from_params(params: &ModelParameters) -> Self {
        Self {
            urban: params.number_or(keys::URBAN_SWING, 0.0),
            suburban: params.number_or(keys::SUBURBAN_SWING, 0.0),
            rural: params.number_or(keys::RURAL_SWING, 0.0),
        }
    }

    const fn for_class(self, class: Classification) -> f64 {
        match class {
            Classification::Urban => self.urban,
            Classification::Suburban => self.suburban,
            Classification::Rural => self.rural,
        }
    }
}

impl SwingModel for DemographicSwing {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "Demographic Swing"
    }

    fn description(&self) -> &'static str {
        "Applies differential swing by urban/suburban/rural classification. Each ward gets its effective swing based on its classification."
    }

    fn parameters(&self) -> Vec<ModelParameter> {
        let mut params = swing::base_parameters();
        params.extend([
            ModelParameter::slider(keys::URBAN_SWING, "Urban Swing (D+)", (-10.0, 10.0, 0.1), 0.0)
                .describe("Swing applied to urban wards (>3,000 people/sq mi)")
                .in_group("demographic"),
            ModelParameter::slider(
                keys::SUBURBAN_SWING,
                "Suburban Swing (D+)",
                (-10.0, 10.0, 0.1),
                0.0,
            )
            .describe("Swing applied to suburban wards (500-3,000 people/sq mi)")
            .in_group("demographic"),
            ModelParameter::slider(keys::RURAL_SWING, "Rural Swing (D+)", (-10.0, 10.0, 0.1), 0.0)
                .describe("Swing applied to rural wards (<500 people/sq mi)")
                .in_group("demographic"),
            swing::turnout_parameter(),
        ]);
        params
    }

    fn predict(
        &self,
        wards: &[WardElections],
        params: &ModelParameters,
        adjustments: &WardAdjustments,
    ) -> Vec<Prediction> {
        let selection = BaseSelection::from_params(params);
        let swings = ClassSwings::from_params(params);

        wards
            .iter()
            .map(|ward| {
                let Some(base) = selection.base_for(ward) else {
                    return Prediction::neutral(&ward.ward_id);
                };
                let points = swings.for_class(adjustments.classification(&ward.ward_id));
                let turnout =
                    adjustments.effective_turnout(&ward.ward_id, selection.turnout_change);

                swing::project(
                    &ward.ward_id,
                    base,
                    ShareShift::Additive(points),
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
