//! The catalog of swing models, keyed by id.

use std::sync::Arc;

use crate::demographic::DemographicSwing;
use crate::mrp::MrpModel;
use crate::proportional::ProportionalSwing;
use crate::uniform::UniformSwing;
use crate::{ModelError, SwingModel};

/// Catalog of registered models, kept in registration order.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: Vec<Arc<dyn SwingModel>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.models.iter().map(|m| m.id()))
            .finish()
    }
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self { models: Vec::new() }
    }

    /// Creates a registry holding the four built-in models.
    #[must_use]
    pub fn with_builtin_models() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(UniformSwing));
        registry.register(Arc::new(ProportionalSwing));
        registry.register(Arc::new(DemographicSwing));
        registry.register(Arc::new(MrpModel));
        registry
    }

    /// Adds `model`, replacing any model already registered under its id
    /// while keeping that model's position.
    pub fn register(&mut self, model: Arc<dyn SwingModel>) {
        if let Some(slot) = self.models.iter_mut().find(|m| m.id() == model.id()) {
            log::debug!("Replacing registered model {}", model.id());
            *slot = model;
        } else {
            self.models.push(model);
        }
    }

    /// Looks up a model by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn SwingModel>> {
        self.models.iter().find(|m| m.id() == id).cloned()
    }

    /// Looks up a model by id, failing when it is not registered.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownModel`] if no model has the id.
    pub fn require(&self, id: &str) -> Result<Arc<dyn SwingModel>, ModelError> {
        self.get(id)
            .ok_or_else(|| ModelError::UnknownModel { id: id.to_string() })
    }

    /// All models in registration order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<dyn SwingModel>> {
        self.models.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use swing_map_election_models::{Prediction, WardElections};
    use swing_map_model_models::{ModelParameter, ModelParameters, WardAdjustments};

    use super::*;

    #[test]
    fn builtin_models_are_registered_in_order() {
        let registry = ModelRegistry::with_builtin_models();
        let ids: Vec<&str> = registry.get_all().iter().map(|m| m.id()).collect();
        assert_eq!(
            ids,
            ["uniform-swing", "proportional-swing", "demographic-swing", "mrp"]
        );
    }

    #[test]
    fn parameter_ids_are_unique_per_model() {
        for model in ModelRegistry::with_builtin_models().get_all() {
            let mut seen = BTreeSet::new();
            for param in model.parameters() {
                assert!(
                    seen.insert(param.id.clone()),
                    "Duplicate parameter {} in {}",
                    param.id,
                    model.id()
                );
            }
        }
    }

    struct Fixed;

    impl SwingModel for Fixed {
        fn id(&self) -> &'static str {
            "uniform-swing"
        }
        fn name(&self) -> &'static str {
            "Fixed"
        }
        fn description(&self) -> &'static str {
            "Always even"
        }
        fn parameters(&self) -> Vec<ModelParameter> {
            Vec::new()
        }
        fn predict(
            &self,
            wards: &[WardElections],
            _params: &ModelParameters,
            _adjustments: &WardAdjustments,
        ) -> Vec<Prediction> {
            wards.iter().map(|w| Prediction::neutral(&w.ward_id)).collect()
        }
    }

    #[test]
    fn register_replaces_in_place() {
        let mut registry = ModelRegistry::with_builtin_models();
        registry.register(Arc::new(Fixed));

        let all = registry.get_all();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].name(), "Fixed");
        assert!(registry.get("missing").is_none());
        assert!(matches!(
            registry.require("missing"),
            Err(ModelError::UnknownModel { .. })
        ));
    }
}
