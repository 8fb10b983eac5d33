#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Swing model parameter types.
//!
//! [`ModelParameters`] is the open key -> value map a model reads its
//! inputs from; keys a model does not declare are ignored. [`ModelParameter`]
//! is the declarative metadata a model publishes so a UI can build its
//! controls. [`WardAdjustments`] carries the per-ward lookup tables
//! (regions, classifications, and their offsets) that accompany a
//! parameter set.

pub mod adjustments;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use swing_map_election_models::RaceType;

pub use adjustments::WardAdjustments;

/// Well-known parameter keys.
pub mod keys {
    /// Year of the base election (text or number).
    pub const BASE_ELECTION_YEAR: &str = "baseElectionYear";
    /// Contest type of the base election.
    pub const BASE_RACE_TYPE: &str = "baseRaceType";
    /// Statewide swing toward Democrats, in points.
    pub const SWING_POINTS: &str = "swingPoints";
    /// Statewide turnout change, in percent.
    pub const TURNOUT_CHANGE: &str = "turnoutChange";
    /// Swing applied to urban wards.
    pub const URBAN_SWING: &str = "urbanSwing";
    /// Swing applied to suburban wards.
    pub const SUBURBAN_SWING: &str = "suburbanSwing";
    /// Swing applied to rural wards.
    pub const RURAL_SWING: &str = "ruralSwing";
    /// MRP college-educated shift.
    pub const COLLEGE_SHIFT: &str = "collegeShift";
    /// MRP urban shift.
    pub const URBAN_SHIFT: &str = "urbanShift";
    /// MRP rural shift.
    pub const RURAL_SHIFT: &str = "ruralShift";
    /// MRP income-effect shift.
    pub const INCOME_SHIFT: &str = "incomeShift";
    /// Prefix of per-region swing keys (e.g. `swing_fox_valley`).
    pub const REGIONAL_SWING_PREFIX: &str = "swing_";
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A boolean toggle.
    Flag(bool),
    /// A numeric value.
    Number(f64),
    /// A text value, also used for numeric selects such as years.
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value. Text is parsed; flags are not numbers.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Flag(_) => None,
        }
    }

    /// Text view of the value. Numbers are rendered without a trailing
    /// `.0` when integral.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Flag(b) => b.to_string(),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Open parameter map read by swing models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParameters(BTreeMap<String, ParamValue>);

impl ModelParameters {
    /// Creates an empty parameter map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`Self::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Removes `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    /// Raw value lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Numeric lookup; `None` when absent or not numeric.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ParamValue::as_number)
    }

    /// Numeric lookup with a fallback.
    #[must_use]
    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    /// Text lookup.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(ParamValue::as_text)
    }

    /// Year lookup, accepting either `"2024"` or `2024`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn year(&self, key: &str) -> Option<i32> {
        self.number(key)
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            .map(|n| n as i32)
    }

    /// Race type lookup; `None` when absent or not a known contest.
    #[must_use]
    pub fn race_type(&self, key: &str) -> Option<RaceType> {
        self.text(key).and_then(|s| s.parse().ok())
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every entry of `other` over this map.
    pub fn extend(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

impl FromIterator<(String, ParamValue)> for ModelParameters {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The kind of UI control a parameter is rendered with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParameterKind {
    /// Continuous range.
    Slider,
    /// One of a fixed set of options.
    Select,
    /// On/off.
    Toggle,
    /// Free numeric entry.
    Number,
}

/// One entry of a select parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Display label.
    pub label: String,
    /// Submitted value.
    pub value: String,
}

/// Declarative description of a model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameter {
    /// Parameter key in [`ModelParameters`].
    pub id: String,
    /// Control label.
    pub label: String,
    /// Control kind.
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    /// Lower bound for sliders and numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound for sliders and numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Step size for sliders and numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// Value used until the user changes it.
    pub default_value: ParamValue,
    /// Options for selects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// Tooltip text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Control group name (e.g. `"demographic"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl ModelParameter {
    /// A slider over `[min, max]`.
    #[must_use]
    pub fn slider(
        id: &str,
        label: &str,
        (min, max, step): (f64, f64, f64),
        default_value: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind: ParameterKind::Slider,
            min: Some(min),
            max: Some(max),
            step: Some(step),
            default_value: ParamValue::Number(default_value),
            options: Vec::new(),
            description: None,
            group: None,
        }
    }

    /// A select over `options` given as `(label, value)` pairs.
    #[must_use]
    pub fn select(id: &str, label: &str, default_value: &str, options: &[(&str, &str)]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind: ParameterKind::Select,
            min: None,
            max: None,
            step: None,
            default_value: ParamValue::Text(default_value.to_string()),
            options: options
                .iter()
                .map(|(label, value)| SelectOption {
                    label: (*label).to_string(),
                    value: (*value).to_string(),
                })
                .collect(),
            description: None,
            group: None,
        }
    }

    /// Attaches a description.
    #[must_use]
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Places the control in a named group.
    #[must_use]
    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }
}

/// Collects the default value of every declared parameter.
#[must_use]
pub fn default_parameters(declared: &[ModelParameter]) -> ModelParameters {
    declared
        .iter()
        .map(|p| (p.id.clone(), p.default_value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_accepts_text_and_number() {
        let params = ModelParameters::new()
            .with(keys::BASE_ELECTION_YEAR, "2024")
            .with("other", 2020);
        assert_eq!(params.year(keys::BASE_ELECTION_YEAR), Some(2024));
        assert_eq!(params.year("other"), Some(2020));
        assert_eq!(params.year("missing"), None);
    }

    #[test]
    fn year_rejects_fractions_and_garbage() {
        let params = ModelParameters::new()
            .with("a", 2024.5)
            .with("b", "twenty");
        assert_eq!(params.year("a"), None);
        assert_eq!(params.year("b"), None);
    }

    #[test]
    fn numeric_text_renders_without_decimal() {
        assert_eq!(ParamValue::Number(2024.0).as_text(), "2024");
        assert_eq!(ParamValue::Number(1.5).as_text(), "1.5");
    }

    #[test]
    fn race_type_parses_known_contests_only() {
        let params = ModelParameters::new()
            .with(keys::BASE_RACE_TYPE, "governor")
            .with("bad", "mayor");
        assert_eq!(
            params.race_type(keys::BASE_RACE_TYPE),
            Some(RaceType::Governor)
        );
        assert_eq!(params.race_type("bad"), None);
    }

    #[test]
    fn untagged_values_deserialize_by_shape() {
        let params: ModelParameters =
            serde_json::from_str(r#"{"a": 1.5, "b": "president", "c": true}"#).unwrap();
        assert_eq!(params.get("a"), Some(&ParamValue::Number(1.5)));
        assert_eq!(params.get("b"), Some(&ParamValue::Text("president".into())));
        assert_eq!(params.get("c"), Some(&ParamValue::Flag(true)));
    }

    #[test]
    fn defaults_come_from_metadata() {
        let declared = [
            ModelParameter::slider(keys::SWING_POINTS, "Swing", (-15.0, 15.0, 0.1), 0.0),
            ModelParameter::select(
                keys::BASE_RACE_TYPE,
                "Race",
                "president",
                &[("President", "president")],
            ),
        ];
        let params = default_parameters(&declared);
        assert_eq!(params.number(keys::SWING_POINTS), Some(0.0));
        assert_eq!(params.text(keys::BASE_RACE_TYPE).as_deref(), Some("president"));
    }

    #[test]
    fn metadata_serializes_kind_as_type() {
        let param = ModelParameter::slider("x", "X", (0.0, 1.0, 0.1), 0.5).in_group("demographic");
        let value = serde_json::to_value(&param).unwrap();
        assert_eq!(value["type"], "slider");
        assert_eq!(value["defaultValue"], 0.5);
        assert_eq!(value["group"], "demographic");
        assert!(value.get("options").is_none());
    }
}
