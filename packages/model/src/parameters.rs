//! The active model and its current parameter values.

use std::sync::Arc;

use swing_map_election_models::Region;
use swing_map_model_models::{
    ModelParameters, ParamValue, WardAdjustments, default_parameters, keys,
};

use crate::presets;
use crate::{ModelError, ModelRegistry, SwingModel};

/// Model selection plus the values fed to it.
///
/// Selecting a model resets its parameters to the model's declared
/// defaults. The per-ward lookup tables (regions and classifications)
/// survive model changes; the regional swing offsets do not.
#[derive(Debug, Clone)]
pub struct ParameterState {
    registry: ModelRegistry,
    active_model_id: String,
    parameters: ModelParameters,
    adjustments: WardAdjustments,
    compute_uncertainty: bool,
}

impl ParameterState {
    /// Starts with `model_id` active and its defaults applied.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownModel`] if `model_id` is not registered.
    pub fn new(registry: ModelRegistry, model_id: &str) -> Result<Self, ModelError> {
        let model = registry.require(model_id)?;
        Ok(Self {
            parameters: default_parameters(&model.parameters()),
            active_model_id: model.id().to_string(),
            registry,
            adjustments: WardAdjustments::default(),
            compute_uncertainty: false,
        })
    }

    /// Switches the active model and resets parameters to its defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownModel`] if `model_id` is not registered;
    /// the state is left unchanged.
    pub fn select_model(&mut self, model_id: &str) -> Result<(), ModelError> {
        let model = self.registry.require(model_id)?;
        log::info!("Switching model {} -> {}", self.active_model_id, model.id());

        self.active_model_id = model.id().to_string();
        self.parameters = default_parameters(&model.parameters());
        self.adjustments.regional_swing.clear();
        Ok(())
    }

    /// Sets one value. `swing_<region>` keys update the regional swing
    /// table instead of the parameter map.
    pub fn set_parameter(&mut self, key: &str, value: impl Into<ParamValue>) {
        let value = value.into();

        let region = key
            .strip_prefix(keys::REGIONAL_SWING_PREFIX)
            .and_then(|name| name.parse::<Region>().ok());

        match (region, value.as_number()) {
            (Some(region), Some(offset)) => {
                self.adjustments.regional_swing.insert(region, offset);
            }
            _ => self.parameters.set(key, value),
        }
    }

    /// Sets every value in `values`, as [`Self::set_parameter`] would.
    pub fn set_parameters(&mut self, values: &ModelParameters) {
        for (key, value) in values.iter() {
            self.set_parameter(key, value.clone());
        }
    }

    /// Resets to the active model's defaults and then applies the preset.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownPreset`] if no preset has the id.
    pub fn apply_preset(&mut self, preset_id: &str) -> Result<(), ModelError> {
        let preset = presets::preset(preset_id)?;
        let (params, regional) = preset.split_regional();

        let mut parameters = default_parameters(&self.active_model().parameters());
        parameters.extend(&params);

        self.parameters = parameters;
        self.adjustments.regional_swing = regional;

        log::info!("Applied scenario preset {}", preset.id);
        Ok(())
    }

    /// Id of the active model.
    #[must_use]
    pub fn active_model_id(&self) -> &str {
        &self.active_model_id
    }

    /// The active model.
    ///
    /// # Panics
    ///
    /// Never in practice: the active id always comes from the registry the
    /// state owns, and models are never unregistered.
    #[must_use]
    pub fn active_model(&self) -> Arc<dyn SwingModel> {
        self.registry
            .get(&self.active_model_id)
            .unwrap_or_else(|| panic!("Active model {} is not registered", self.active_model_id))
    }

    /// Current parameter values.
    #[must_use]
    pub const fn parameters(&self) -> &ModelParameters {
        &self.parameters
    }

    /// Current per-ward lookup tables.
    #[must_use]
    pub const fn adjustments(&self) -> &WardAdjustments {
        &self.adjustments
    }

    /// Mutable access to the lookup tables, used when ward metadata loads.
    pub const fn adjustments_mut(&mut self) -> &mut WardAdjustments {
        &mut self.adjustments
    }

    /// Whether uncertainty bands are requested with each prediction.
    #[must_use]
    pub const fn compute_uncertainty(&self) -> bool {
        self.compute_uncertainty
    }

    /// Toggles uncertainty computation.
    pub const fn set_compute_uncertainty(&mut self, enabled: bool) {
        self.compute_uncertainty = enabled;
    }

    /// The registry models are selected from.
    #[must_use]
    pub const fn registry(&self) -> &ModelRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(model_id: &str) -> ParameterState {
        ParameterState::new(ModelRegistry::with_builtin_models(), model_id).unwrap()
    }

    #[test]
    fn new_state_holds_model_defaults() {
        let state = state("uniform-swing");
        assert_eq!(state.parameters().text(keys::BASE_ELECTION_YEAR).as_deref(), Some("2024"));
        assert_eq!(state.parameters().number(keys::SWING_POINTS), Some(0.0));
        assert!(!state.compute_uncertainty());
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!(matches!(
            ParameterState::new(ModelRegistry::with_builtin_models(), "nope"),
            Err(ModelError::UnknownModel { .. })
        ));

        let mut state = state("uniform-swing");
        assert!(state.select_model("nope").is_err());
        assert_eq!(state.active_model_id(), "uniform-swing");
    }

    #[test]
    fn selecting_a_model_resets_parameters() {
        let mut state = state("uniform-swing");
        state.set_parameter(keys::SWING_POINTS, 7.0);
        state.set_parameter("swing_rural", -2.0);

        state.select_model("demographic-swing").unwrap();

        assert_eq!(state.active_model_id(), "demographic-swing");
        assert_eq!(state.parameters().number(keys::SWING_POINTS), None);
        assert_eq!(state.parameters().number(keys::URBAN_SWING), Some(0.0));
        assert!(state.adjustments().regional_swing.is_empty());
    }

    #[test]
    fn regional_keys_route_to_adjustments() {
        let mut state = state("uniform-swing");
        state.set_parameters(
            &ModelParameters::new()
                .with("swing_madison_metro", 3.0)
                .with(keys::SWING_POINTS, 1.5),
        );

        assert_eq!(
            state.adjustments().regional_swing.get(&Region::MadisonMetro),
            Some(&3.0)
        );
        assert_eq!(state.parameters().get("swing_madison_metro"), None);
        assert_eq!(state.parameters().number(keys::SWING_POINTS), Some(1.5));
    }

    #[test]
    fn preset_applies_over_defaults() {
        let mut state = state("uniform-swing");
        state.set_parameter(keys::TURNOUT_CHANGE, 22.0);
        state.set_parameter("swing_rural", 4.0);

        state.apply_preset("d-wave-5").unwrap();

        assert_eq!(state.parameters().number(keys::SWING_POINTS), Some(5.0));
        assert_eq!(state.parameters().number(keys::TURNOUT_CHANGE), Some(0.0));
        assert_eq!(state.adjustments().regional_swing.get(&Region::Rural), Some(&0.0));
    }

    #[test]
    fn unknown_preset_leaves_state_alone() {
        let mut state = state("uniform-swing");
        state.set_parameter(keys::SWING_POINTS, 2.0);
        assert!(state.apply_preset("missing").is_err());
        assert_eq!(state.parameters().number(keys::SWING_POINTS), Some(2.0));
    }
}
