//! Scenario presets, loaded from embedded TOML.
//!
//! Each `.toml` file in `packages/model/presets/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a preset means adding a
//! file and an entry to the list below.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use swing_map_election_models::Region;
use swing_map_model_models::{ModelParameters, keys};

use crate::ModelError;

const PRESET_TOMLS: &[(&str, &str)] = &[
    ("2020-electorate", include_str!("../presets/2020-electorate.toml")),
    ("2016-electorate", include_str!("../presets/2016-electorate.toml")),
    ("high-turnout", include_str!("../presets/high-turnout.toml")),
    ("low-turnout", include_str!("../presets/low-turnout.toml")),
    ("d-wave-5", include_str!("../presets/d-wave-5.toml")),
    ("r-wave-5", include_str!("../presets/r-wave-5.toml")),
];

/// A named parameter bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPreset {
    /// Unique identifier (e.g. `"d-wave-5"`).
    pub id: String,
    /// Display label.
    pub label: String,
    /// One-line description.
    pub description: String,
    /// Parameter values, including any `swing_<region>` offsets.
    pub params: ModelParameters,
}

impl ScenarioPreset {
    /// Splits the preset's values into plain model parameters and the
    /// regional swing table carried by its `swing_<region>` keys.
    ///
    /// Keys with the regional prefix that do not name a known region are
    /// kept as plain parameters.
    #[must_use]
    pub fn split_regional(&self) -> (ModelParameters, BTreeMap<Region, f64>) {
        let mut params = ModelParameters::new();
        let mut regional = BTreeMap::new();

        for (key, value) in self.params.iter() {
            let region = key
                .strip_prefix(keys::REGIONAL_SWING_PREFIX)
                .and_then(|name| name.parse::<Region>().ok());

            match (region, value.as_number()) {
                (Some(region), Some(offset)) => {
                    regional.insert(region, offset);
                }
                _ => params.set(key.clone(), value.clone()),
            }
        }

        (params, regional)
    }
}

/// Parses a single preset definition.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or missing required fields.
pub fn parse_preset_toml(toml_str: &str) -> Result<ScenarioPreset, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns all scenario presets, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (the configs are embedded, so
/// this surfaces in tests rather than at runtime).
#[must_use]
pub fn all_presets() -> Vec<ScenarioPreset> {
    PRESET_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_preset_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up a preset by id.
///
/// # Errors
///
/// Returns [`ModelError::UnknownPreset`] if no preset has the id.
pub fn preset(id: &str) -> Result<ScenarioPreset, ModelError> {
    all_presets()
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ModelError::UnknownPreset { id: id.to_string() })
}
