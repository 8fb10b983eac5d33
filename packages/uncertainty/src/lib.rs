#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Model-independent uncertainty for ward predictions.
//!
//! Confidence comes from the ward's own history of the base contest: more
//! elections and steadier margins raise it, disaggregated estimates lower
//! it. The confidence sets the width of a band around the point
//! prediction.

use std::collections::{BTreeMap, HashMap};

use swing_map_election_models::{
    ElectionRecord, Prediction, RaceType, UncertaintyBand, WardElections,
};

/// Volatility assumed when fewer than two elections exist.
pub const DEFAULT_VOLATILITY: f64 = 10.0;

const BASE_CONFIDENCE: f64 = 0.3;
const PER_ELECTION_CONFIDENCE: f64 = 0.05;
const MAX_HISTORY_CONFIDENCE: f64 = 0.3;
const MAX_STABILITY_CONFIDENCE: f64 = 0.3;
const VOLATILITY_PENALTY: f64 = 0.02;
const ESTIMATE_PENALTY: f64 = 0.1;
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.9;

/// Band half-width, in points, at zero confidence.
const MAX_BAND_WIDTH: f64 = 20.0;

/// Opacity of the widest bands in the uncertainty overlay.
pub const MIN_OPACITY: f64 = 0.3;
/// Opacity of bands 5 points wide or narrower.
pub const MAX_OPACITY: f64 = 1.0;

/// Summary of a ward's history for one contest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryStats {
    /// Number of elections of the contest.
    pub election_count: usize,
    /// Population standard deviation of their margins.
    pub volatility: f64,
    /// Whether any of them is a disaggregated estimate.
    pub has_estimates: bool,
}

impl HistoryStats {
    /// Computes the stats over `elections`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_elections<'a>(elections: impl IntoIterator<Item = &'a ElectionRecord>) -> Self {
        let elections: Vec<&ElectionRecord> = elections.into_iter().collect();
        let election_count = elections.len();

        let volatility = if election_count >= 2 {
            let n = election_count as f64;
            let mean = elections.iter().map(|e| e.margin).sum::<f64>() / n;
            let variance = elections
                .iter()
                .map(|e| (e.margin - mean).powi(2))
                .sum::<f64>()
                / n;
            variance.sqrt()
        } else {
            DEFAULT_VOLATILITY
        };

        Self {
            election_count,
            volatility,
            has_estimates: elections.iter().any(|e| e.is_estimate),
        }
    }

    /// Confidence in `[0.1, 0.9]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn confidence(&self) -> f64 {
        let history =
            (self.election_count as f64 * PER_ELECTION_CONFIDENCE).min(MAX_HISTORY_CONFIDENCE);
        let stability = (MAX_STABILITY_CONFIDENCE - self.volatility * VOLATILITY_PENALTY).max(0.0);
        let penalty = if self.has_estimates {
            ESTIMATE_PENALTY
        } else {
            0.0
        };

        (BASE_CONFIDENCE + history + stability - penalty).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    }
}

/// Confidence for one ward's history of `race_type`.
#[must_use]
pub fn ward_confidence(ward: &WardElections, race_type: RaceType) -> f64 {
    HistoryStats::from_elections(ward.elections_of(race_type)).confidence()
}

/// Band around `prediction` for the given confidence.
///
/// The share bounds are clamped to `[0, 100]`; the margin bounds are not.
#[must_use]
pub fn band_for(prediction: &Prediction, confidence: f64) -> UncertaintyBand {
    let width = (1.0 - confidence) * MAX_BAND_WIDTH;

    UncertaintyBand {
        ward_id: prediction.ward_id.clone(),
        lower_dem_pct: (prediction.predicted_dem_pct - width).max(0.0),
        upper_dem_pct: (prediction.predicted_dem_pct + width).min(100.0),
        lower_margin: prediction.predicted_margin - width * 2.0,
        upper_margin: prediction.predicted_margin + width * 2.0,
    }
}

/// One band per ward in `wards`, in the same order.
///
/// Wards without a matching prediction get [`UncertaintyBand::maximal`].
#[must_use]
pub fn estimate_uncertainty(
    wards: &[WardElections],
    predictions: &[Prediction],
    race_type: RaceType,
) -> Vec<UncertaintyBand> {
    let by_ward: HashMap<&str, &Prediction> = predictions
        .iter()
        .map(|p| (p.ward_id.as_str(), p))
        .collect();

    let bands: Vec<UncertaintyBand> = wards
        .iter()
        .map(|ward| {
            by_ward.get(ward.ward_id.as_str()).map_or_else(
                || UncertaintyBand::maximal(&ward.ward_id),
                |prediction| band_for(prediction, ward_confidence(ward, race_type)),
            )
        })
        .collect();

    log::debug!(
        "Estimated {} uncertainty bands for {race_type}",
        bands.len()
    );

    bands
}

/// Render opacity for a band of the given width: narrower is more opaque.
#[must_use]
pub fn band_opacity(width: f64) -> f64 {
    (1.0 - (width - 5.0) / 50.0).clamp(MIN_OPACITY, MAX_OPACITY)
}

/// Ward id -> opacity for every band.
#[must_use]
pub fn opacity_map(bands: &[UncertaintyBand]) -> BTreeMap<String, f64> {
    bands
        .iter()
        .map(|band| (band.ward_id.clone(), band_opacity(band.dem_pct_width())))
        .collect()
}

/// Bands narrower than this count as high confidence in [`BandSummary`].
pub const HIGH_CONFIDENCE_WIDTH: f64 = 10.0;
/// Bands wider than this count as low confidence in [`BandSummary`].
pub const LOW_CONFIDENCE_WIDTH: f64 = 25.0;

/// Overview of a band set for the uncertainty legend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandSummary {
    /// Mean Democratic share width, in points.
    pub average_width: f64,
    /// Bands narrower than [`HIGH_CONFIDENCE_WIDTH`].
    pub high_confidence: usize,
    /// Bands wider than [`LOW_CONFIDENCE_WIDTH`].
    pub low_confidence: usize,
}

impl BandSummary {
    /// `None` for an empty set.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_bands(bands: &[UncertaintyBand]) -> Option<Self> {
        if bands.is_empty() {
            return None;
        }

        let widths = bands.iter().map(UncertaintyBand::dem_pct_width);
        Some(Self {
            average_width: widths.clone().sum::<f64>() / bands.len() as f64,
            high_confidence: widths.clone().filter(|w| *w < HIGH_CONFIDENCE_WIDTH).count(),
            low_confidence: widths.filter(|w| *w > LOW_CONFIDENCE_WIDTH).count(),
        })
    }
}
