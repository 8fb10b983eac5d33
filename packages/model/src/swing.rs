//! Base-election lookup and vote projection shared by the local models.
//!
//! All local models follow the same mechanics: pick the base election,
//! shift the Democratic two-party share, clamp it to `[0.01, 0.99]`, and
//! scale votes by the turnout multiplier. Total votes and two-party votes
//! are rounded independently, so `dem + rep` can differ from the total by
//! a vote or two.

use swing_map_election_models::{
    ElectionRecord, Prediction, RaceType, UncertaintyBand, WardElections,
};
use swing_map_model_models::{ModelParameter, ModelParameters, keys};
use swing_map_uncertainty::estimate_uncertainty;

use crate::ValidationReport;

/// Lowest Democratic two-party share a projection may reach.
pub const MIN_DEM_SHARE: f64 = 0.01;

/// Highest Democratic two-party share a projection may reach.
pub const MAX_DEM_SHARE: f64 = 0.99;

/// Vote-sum drift below this many votes is not reported by validation.
const VOTE_SUM_TOLERANCE: f64 = 1.0;

/// How the swing moves the base Democratic share.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShareShift {
    /// `share + points / 100`.
    Additive(f64),
    /// `share * (1 + points / 100)`.
    Multiplicative(f64),
}

impl ShareShift {
    /// Applies the shift and clamps the result.
    #[must_use]
    pub fn apply(self, base_share: f64) -> f64 {
        let shifted = match self {
            Self::Additive(points) => base_share + points / 100.0,
            Self::Multiplicative(points) => base_share * (1.0 + points / 100.0),
        };
        shifted.clamp(MIN_DEM_SHARE, MAX_DEM_SHARE)
    }
}

/// The base election for a ward: the exact `(year, race)` record, else the
/// most recent record of that race.
#[must_use]
pub fn find_base_election(
    ward: &WardElections,
    year: Option<i32>,
    race_type: RaceType,
) -> Option<&ElectionRecord> {
    year.and_then(|year| {
        ward.elections_of(race_type)
            .find(|election| election.year == year)
    })
    .or_else(|| ward.elections_of(race_type).max_by_key(|e| e.year))
}

/// Projects one ward from its base election.
///
/// A base with no two-party votes yields [`Prediction::neutral`].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn project(
    ward_id: &str,
    base: &ElectionRecord,
    shift: ShareShift,
    turnout_change: f64,
    confidence: f64,
) -> Prediction {
    let two_party_base = base.two_party_votes();
    if two_party_base <= 0.0 {
        return Prediction::neutral(ward_id);
    }

    let adjusted_share = shift.apply(base.dem_votes / two_party_base);
    let turnout_multiplier = 1.0 + turnout_change / 100.0;

    let projected_total = (base.total_votes * turnout_multiplier).round() as i64;
    let two_party_total = (two_party_base * turnout_multiplier).round() as i64;

    let projected_dem = (two_party_total as f64 * adjusted_share).round() as i64;
    let projected_rep = two_party_total - projected_dem;

    let (dem_pct, rep_pct, margin) = if projected_total > 0 {
        let total = projected_total as f64;
        (
            projected_dem as f64 / total * 100.0,
            projected_rep as f64 / total * 100.0,
            (projected_dem - projected_rep) as f64 / total * 100.0,
        )
    } else {
        (50.0, 50.0, 0.0)
    };

    Prediction {
        ward_id: ward_id.to_string(),
        predicted_dem_pct: dem_pct,
        predicted_rep_pct: rep_pct,
        predicted_margin: margin,
        predicted_dem_votes: projected_dem,
        predicted_rep_votes: projected_rep,
        predicted_total_votes: projected_total,
        confidence,
    }
}

/// Base-election selection read from a parameter set.
#[derive(Debug, Clone, Copy)]
pub struct BaseSelection {
    /// Requested base year, if any.
    pub year: Option<i32>,
    /// Requested contest; `None` when missing or unrecognized.
    pub race_type: Option<RaceType>,
    /// Statewide turnout change, in percent.
    pub turnout_change: f64,
}

impl BaseSelection {
    /// Reads the base selection keys shared by every local model.
    #[must_use]
    pub fn from_params(params: &ModelParameters) -> Self {
        Self {
            year: params.year(keys::BASE_ELECTION_YEAR),
            race_type: params.race_type(keys::BASE_RACE_TYPE),
            turnout_change: params.number_or(keys::TURNOUT_CHANGE, 0.0),
        }
    }

    /// The ward's base election under this selection.
    #[must_use]
    pub fn base_for<'a>(&self, ward: &'a WardElections) -> Option<&'a ElectionRecord> {
        self.race_type
            .and_then(|race| find_base_election(ward, self.year, race))
    }
}

/// Base-election selectors shared by every model's parameter list.
#[must_use]
pub fn base_parameters() -> Vec<ModelParameter> {
    vec![
        ModelParameter::select(keys::BASE_ELECTION_YEAR, "Base Election", "2024", &[])
            .describe("The election to use as the baseline for projections"),
        ModelParameter::select(
            keys::BASE_RACE_TYPE,
            "Base Race",
            "president",
            &[
                ("President", "president"),
                ("Governor", "governor"),
                ("US Senate", "us_senate"),
                ("State Senate", "state_senate"),
                ("State Assembly", "state_assembly"),
            ],
        ),
    ]
}

/// The statewide turnout slider.
#[must_use]
pub fn turnout_parameter() -> ModelParameter {
    ModelParameter::slider(keys::TURNOUT_CHANGE, "Turnout Change (%)", (-30.0, 30.0, 1.0), 0.0)
        .describe("Uniform percentage change in turnout across all wards")
}

/// Uncertainty from historical volatility of the base contest.
#[must_use]
pub fn historical_uncertainty(
    wards: &[WardElections],
    params: &ModelParameters,
    predictions: &[Prediction],
) -> Option<Vec<UncertaintyBand>> {
    let race_type = params.race_type(keys::BASE_RACE_TYPE)?;
    Some(estimate_uncertainty(wards, predictions, race_type))
}

/// Input check shared by the local models.
#[must_use]
pub fn validate_history(wards: &[WardElections], params: &ModelParameters) -> ValidationReport {
    let mut report = ValidationReport::ok();
    let selection = BaseSelection::from_params(params);

    if wards.is_empty() {
        report.errors.push("no ward history loaded".to_string());
    }

    let Some(race_type) = selection.race_type else {
        report.errors.push(format!(
            "unrecognized base race type: {:?}",
            params.text(keys::BASE_RACE_TYPE)
        ));
        report.valid = false;
        return report;
    };

    for ward in wards {
        if selection.base_for(ward).is_none() {
            report.warnings.push(format!(
                "ward {} has no {race_type} election; projecting an even split",
                ward.ward_id
            ));
        }
        for election in ward.elections_of(race_type) {
            let drift = election.vote_sum_discrepancy();
            if drift.abs() >= VOTE_SUM_TOLERANCE {
                report.warnings.push(format!(
                    "ward {} {} {race_type}: vote components differ from total by {drift}",
                    ward.ward_id, election.year
                ));
            }
        }
    }

    report.valid = report.errors.is_empty();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ward(elections: Vec<ElectionRecord>) -> WardElections {
        WardElections {
            ward_id: "w".to_string(),
            elections,
        }
    }

    #[test]
    fn exact_year_wins_over_latest() {
        let w = ward(vec![
            ElectionRecord::from_votes(2016, RaceType::President, 1.0, 1.0, 0.0),
            ElectionRecord::from_votes(2020, RaceType::President, 2.0, 1.0, 0.0),
            ElectionRecord::from_votes(2024, RaceType::President, 3.0, 1.0, 0.0),
        ]);
        let base = find_base_election(&w, Some(2020), RaceType::President).unwrap();
        assert_eq!(base.year, 2020);
    }

    #[test]
    fn missing_year_falls_back_to_latest_of_race() {
        let w = ward(vec![
            ElectionRecord::from_votes(2016, RaceType::President, 1.0, 1.0, 0.0),
            ElectionRecord::from_votes(2022, RaceType::Governor, 1.0, 1.0, 0.0),
            ElectionRecord::from_votes(2020, RaceType::President, 2.0, 1.0, 0.0),
        ]);
        let base = find_base_election(&w, Some(2024), RaceType::President).unwrap();
        assert_eq!(base.year, 2020);
        assert!(find_base_election(&w, None, RaceType::UsSenate).is_none());
    }

    #[test]
    fn shift_is_clamped_to_open_unit_interval() {
        for points in [-200.0, -50.0, -5.0, 0.0, 5.0, 50.0, 200.0] {
            for base in [0.0, 0.02, 0.5, 0.98, 1.0] {
                for shift in [ShareShift::Additive(points), ShareShift::Multiplicative(points)] {
                    let share = shift.apply(base);
                    assert!(
                        (MIN_DEM_SHARE..=MAX_DEM_SHARE).contains(&share),
                        "{shift:?} on {base} gave {share}"
                    );
                }
            }
        }
    }

    #[test]
    fn degenerate_base_is_neutral() {
        let base = ElectionRecord::from_votes(2024, RaceType::President, 0.0, 0.0, 12.0);
        let prediction = project("w", &base, ShareShift::Additive(5.0), 0.0, 0.7);
        assert_eq!(prediction, Prediction::neutral("w"));
    }

    #[test]
    fn collapsed_turnout_reports_even_split() {
        let base = ElectionRecord::from_votes(2024, RaceType::President, 600.0, 400.0, 0.0);
        let prediction = project("w", &base, ShareShift::Additive(0.0), -100.0, 0.7);
        assert_eq!(prediction.predicted_total_votes, 0);
        assert!((prediction.predicted_dem_pct - 50.0).abs() < f64::EPSILON);
        assert!(prediction.predicted_margin.abs() < f64::EPSILON);
    }

    #[test]
    fn validation_flags_missing_race_and_vote_drift() {
        let mut drifted = ElectionRecord::from_votes(2024, RaceType::President, 600.0, 400.0, 0.0);
        drifted.total_votes = 1_010.0;
        let wards = vec![
            WardElections {
                ward_id: "a".into(),
                elections: vec![drifted],
            },
            WardElections {
                ward_id: "b".into(),
                elections: vec![],
            },
        ];
        let params = ModelParameters::new()
            .with(keys::BASE_ELECTION_YEAR, "2024")
            .with(keys::BASE_RACE_TYPE, "president");

        let report = validate_history(&wards, &params);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 2);

        let report = validate_history(&wards, &params.with(keys::BASE_RACE_TYPE, "mayor"));
        assert!(!report.valid);
    }
}
