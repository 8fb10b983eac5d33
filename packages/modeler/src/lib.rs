#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! A swing modeler session.
//!
//! [`SwingModeler`] wires the pieces together: parameter changes go to the
//! [`PredictionEngine`], and each finished output is painted through
//! [`MapStateSync`], turned into opacity overrides when uncertainty is
//! shown, and rolled up into geography summaries.

use std::collections::BTreeMap;

use swing_map_aggregate::{
    AggregatedResult, by_assembly_district, by_congressional_district, by_county,
    by_senate_district, statewide,
};
use swing_map_election_models::{Prediction, RaceType, WardMeta, WardRecord};
use swing_map_engine::{EngineError, EngineState, PredictionEngine, PredictionRequest};
use swing_map_engine_models::PredictionOutput;
use swing_map_map_sync::{FeatureStateStore, MapLayer, MapStateSync, SyncOutcome};
use swing_map_model::swing::find_base_election;
use swing_map_model::{ModelError, ModelRegistry, ParameterState};
use swing_map_model_models::{ModelParameters, ParamValue, keys};
use swing_map_uncertainty::{BandSummary, opacity_map};
use swing_map_ward_history::{BackendClient, WardHistoryError, WardHistoryStore};

/// Errors from a modeler session.
#[derive(Debug, thiserror::Error)]
pub enum ModelerError {
    /// Unknown model or preset.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The prediction engine rejected a request.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Ward history or boundaries could not be loaded.
    #[error(transparent)]
    WardHistory(#[from] WardHistoryError),
}

/// Geography roll-ups of one prediction set.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Generation of the output the summary was built from.
    pub generation: u64,
    /// Per county, most Democratic first.
    pub county: Vec<AggregatedResult>,
    /// Per congressional district.
    pub congressional: Vec<AggregatedResult>,
    /// Per state senate district.
    pub senate: Vec<AggregatedResult>,
    /// Per assembly district.
    pub assembly: Vec<AggregatedResult>,
    /// Every ward, including those without geography.
    pub statewide: AggregatedResult,
    /// Present when the output carried uncertainty bands.
    pub uncertainty: Option<BandSummary>,
}

impl Summary {
    #[must_use]
    pub fn new(
        generation: u64,
        predictions: &[Prediction],
        metadata: &BTreeMap<String, WardMeta>,
    ) -> Self {
        Self {
            generation,
            county: by_county(predictions, metadata),
            congressional: by_congressional_district(predictions, metadata),
            senate: by_senate_district(predictions, metadata),
            assembly: by_assembly_district(predictions, metadata),
            statewide: statewide(predictions),
            uncertainty: None,
        }
    }
}

/// One modeler session over a loaded ward history.
pub struct SwingModeler<S: FeatureStateStore> {
    parameters: ParameterState,
    engine: PredictionEngine,
    history: WardHistoryStore,
    map: MapStateSync<S>,
    show_uncertainty: bool,
    applied_generation: u64,
    summary: Option<Summary>,
}

impl<S: FeatureStateStore> std::fmt::Debug for SwingModeler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwingModeler")
            .field("active_model", &self.parameters.active_model_id())
            .field("wards", &self.history.len())
            .field("show_uncertainty", &self.show_uncertainty)
            .field("applied_generation", &self.applied_generation)
            .finish_non_exhaustive()
    }
}

impl<S: FeatureStateStore> SwingModeler<S> {
    /// Starts a session with `model_id` active. Ward regions are derived
    /// from the history's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ModelerError::Model`] if `model_id` is not registered.
    pub fn new(
        registry: ModelRegistry,
        engine: PredictionEngine,
        history: WardHistoryStore,
        map: MapStateSync<S>,
        model_id: &str,
    ) -> Result<Self, ModelerError> {
        let mut parameters = ParameterState::new(registry, model_id)?;
        parameters.adjustments_mut().ward_regions = history.region_map();

        Ok(Self {
            parameters,
            engine,
            history,
            map,
            show_uncertainty: false,
            applied_generation: 0,
            summary: None,
        })
    }

    /// Loads one election's ward results and the boundary geography from
    /// the backend, then starts a session projecting from that election.
    /// The engine's registry is used for the session.
    ///
    /// # Errors
    ///
    /// Returns [`ModelerError::WardHistory`] if loading fails, or
    /// [`ModelerError::Model`] if `model_id` is not registered.
    pub async fn load(
        client: &BackendClient,
        base: (i32, RaceType),
        vintage: u16,
        engine: PredictionEngine,
        map: MapStateSync<S>,
        model_id: &str,
    ) -> Result<Self, ModelerError> {
        let (year, race_type) = base;
        let history = client.load_store(year, race_type, vintage).await?;
        let registry = engine.registry().clone();

        let mut modeler = Self::new(registry, engine, history, map, model_id)?;
        modeler.set_base_election(year, race_type);
        Ok(modeler)
    }

    /// Points the base-election parameters at `(year, race_type)` without
    /// recomputing.
    pub fn set_base_election(&mut self, year: i32, race_type: RaceType) {
        self.parameters
            .set_parameter(keys::BASE_ELECTION_YEAR, year.to_string());
        self.parameters
            .set_parameter(keys::BASE_RACE_TYPE, race_type.to_string());
    }

    #[must_use]
    pub const fn parameters(&self) -> &ParameterState {
        &self.parameters
    }

    #[must_use]
    pub const fn history(&self) -> &WardHistoryStore {
        &self.history
    }

    #[must_use]
    pub const fn engine(&self) -> &PredictionEngine {
        &self.engine
    }

    #[must_use]
    pub const fn map(&self) -> &MapStateSync<S> {
        &self.map
    }

    /// Switches models, resetting parameters to its defaults, and
    /// recomputes.
    ///
    /// # Errors
    ///
    /// Returns [`ModelerError::Model`] if `model_id` is not registered.
    pub fn set_active_model(&mut self, model_id: &str) -> Result<u64, ModelerError> {
        self.parameters.select_model(model_id)?;
        self.recompute()
    }

    /// Sets one parameter and recomputes.
    ///
    /// # Errors
    ///
    /// See [`Self::recompute`].
    pub fn set_parameter(
        &mut self,
        key: &str,
        value: impl Into<ParamValue>,
    ) -> Result<u64, ModelerError> {
        self.parameters.set_parameter(key, value);
        self.recompute()
    }

    /// Sets several parameters and recomputes once.
    ///
    /// # Errors
    ///
    /// See [`Self::recompute`].
    pub fn set_parameters(&mut self, values: &ModelParameters) -> Result<u64, ModelerError> {
        self.parameters.set_parameters(values);
        self.recompute()
    }

    /// Applies a scenario preset and recomputes.
    ///
    /// # Errors
    ///
    /// Returns [`ModelerError::Model`] if the preset does not exist.
    pub fn apply_preset(&mut self, preset_id: &str) -> Result<u64, ModelerError> {
        self.parameters.apply_preset(preset_id)?;
        self.recompute()
    }

    /// Toggles the uncertainty overlay. Turning it off removes the opacity
    /// overrides at once; turning it on recomputes so bands are produced.
    ///
    /// # Errors
    ///
    /// See [`Self::recompute`].
    pub fn set_show_uncertainty(&mut self, show: bool) -> Result<Option<u64>, ModelerError> {
        if self.show_uncertainty == show {
            return Ok(None);
        }

        self.show_uncertainty = show;
        self.parameters.set_compute_uncertainty(show);

        if show {
            return self.recompute().map(Some);
        }

        let cleared = self.map.clear_opacity();
        log::debug!("Uncertainty hidden, cleared {cleared} opacity overrides");
        if let Some(summary) = &mut self.summary {
            summary.uncertainty = None;
        }
        Ok(None)
    }

    #[must_use]
    pub const fn show_uncertainty(&self) -> bool {
        self.show_uncertainty
    }

    /// Sends the current parameters to the engine. Returns the request's
    /// generation.
    ///
    /// # Errors
    ///
    /// Returns [`ModelerError::Engine`] if the engine rejects the request.
    pub fn recompute(&mut self) -> Result<u64, ModelerError> {
        let request = PredictionRequest {
            model_id: self.parameters.active_model_id().to_string(),
            parameters: self.parameters.parameters().clone(),
            adjustments: self.parameters.adjustments().clone(),
            ward_data: self.history.worker_payload(),
            compute_uncertainty: self.show_uncertainty,
        };
        Ok(self.engine.request(request)?)
    }

    /// Waits for the newest request to finish and returns the engine state
    /// at that point.
    pub async fn next_output(&self) -> Option<EngineState> {
        let requested = self.engine.state().requested;
        self.engine.wait_for_generation(requested).await
    }

    /// Waits for the newest request and applies its output, if any.
    /// `None` when the request produced nothing new.
    pub async fn refresh(&mut self) -> Option<SyncOutcome> {
        let state = self.next_output().await?;
        if let Some(error) = &state.last_error {
            log::warn!("Keeping previous predictions: {error}");
        }
        let output = state.latest?;
        Some(self.apply_output(&output))
    }

    /// Paints `output`, updates the opacity overrides, and recomputes the
    /// summaries. Outputs older than the one already applied are ignored.
    pub fn apply_output(&mut self, output: &PredictionOutput) -> SyncOutcome {
        if output.generation <= self.applied_generation {
            log::debug!(
                "Ignoring output {} (already applied {})",
                output.generation,
                self.applied_generation
            );
            return SyncOutcome::Unchanged;
        }
        self.applied_generation = output.generation;

        let params = self.parameters.parameters();
        let year = params.year(keys::BASE_ELECTION_YEAR);
        let race_type = params.race_type(keys::BASE_RACE_TYPE);
        let history = &self.history;
        let layer = MapLayer::from_predictions(&output.predictions, year, race_type, |ward_id| {
            race_type
                .zip(history.elections(ward_id))
                .and_then(|(race_type, ward)| find_base_election(ward, year, race_type))
                .is_some_and(|base| base.is_estimate)
        });
        let outcome = self.map.apply_layer(layer);

        let bands = output
            .uncertainty
            .as_deref()
            .filter(|_| self.show_uncertainty);
        match bands {
            Some(bands) => {
                self.map.apply_opacity(opacity_map(bands));
            }
            None => {
                self.map.clear_opacity();
            }
        }

        let mut summary = Summary::new(
            output.generation,
            &output.predictions,
            self.history.metadata(),
        );
        summary.uncertainty = bands.and_then(BandSummary::from_bands);
        self.summary = Some(summary);

        outcome
    }

    /// Summaries of the last applied output.
    #[must_use]
    pub const fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Moves the selection highlight and returns the selected ward's record.
    pub fn select_ward(&mut self, ward_id: Option<&str>) -> Option<&WardRecord> {
        self.map.set_selected(ward_id);
        ward_id.and_then(|id| self.history.get(id))
    }

    /// Moves the hover highlight.
    pub fn hover_ward(&mut self, ward_id: Option<&str>) {
        self.map.set_hovered(ward_id);
    }
}
