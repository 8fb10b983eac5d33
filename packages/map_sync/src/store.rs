//! Feature-state store abstraction.

use std::collections::BTreeMap;

use serde_json::Value;

/// Attribute bag attached to one feature.
pub type FeatureState = serde_json::Map<String, Value>;

/// A renderer-owned store of per-feature attributes keyed by feature id.
///
/// Writes merge into the existing bag, removals drop individual keys. The
/// store is not assumed to be safe for concurrent writers.
pub trait FeatureStateStore {
    /// Merges `state` into the attributes of feature `id`.
    fn set_feature_state(&mut self, id: &str, state: &FeatureState);

    /// Removes `keys` from the attributes of feature `id`.
    fn remove_feature_state(&mut self, id: &str, keys: &[&str]);
}

/// [`FeatureStateStore`] held in memory. Counts every call so write volume
/// can be observed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeatureStore {
    states: BTreeMap<String, FeatureState>,
    set_calls: usize,
    remove_calls: usize,
}

impl InMemoryFeatureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes of feature `id`, if it has any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FeatureState> {
        self.states.get(id)
    }

    /// Single attribute of feature `id`.
    #[must_use]
    pub fn attribute(&self, id: &str, key: &str) -> Option<&Value> {
        self.states.get(id).and_then(|state| state.get(key))
    }

    /// Ids of features whose `key` attribute is `true`.
    #[must_use]
    pub fn flagged(&self, key: &str) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, state)| state.get(key).and_then(Value::as_bool) == Some(true))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Number of features with at least one attribute.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub const fn set_calls(&self) -> usize {
        self.set_calls
    }

    #[must_use]
    pub const fn remove_calls(&self) -> usize {
        self.remove_calls
    }

    /// Zeroes both call counters.
    pub const fn reset_counts(&mut self) {
        self.set_calls = 0;
        self.remove_calls = 0;
    }
}

impl FeatureStateStore for InMemoryFeatureStore {
    fn set_feature_state(&mut self, id: &str, state: &FeatureState) {
        self.set_calls += 1;
        let entry = self.states.entry(id.to_string()).or_default();
        for (key, value) in state {
            entry.insert(key.clone(), value.clone());
        }
    }

    fn remove_feature_state(&mut self, id: &str, keys: &[&str]) {
        self.remove_calls += 1;
        if let Some(state) = self.states.get_mut(id) {
            for key in keys {
                state.remove(*key);
            }
            if state.is_empty() {
                self.states.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bag(value: Value) -> FeatureState {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn set_merges_and_remove_drops_keys() {
        let mut store = InMemoryFeatureStore::new();
        store.set_feature_state("w1", &bag(json!({ "demPct": 55.0 })));
        store.set_feature_state("w1", &bag(json!({ "opacity": 0.5 })));

        assert_eq!(store.attribute("w1", "demPct"), Some(&json!(55.0)));
        assert_eq!(store.attribute("w1", "opacity"), Some(&json!(0.5)));

        store.remove_feature_state("w1", &["demPct"]);
        assert!(store.attribute("w1", "demPct").is_none());
        assert_eq!(store.len(), 1);

        store.remove_feature_state("w1", &["opacity"]);
        assert!(store.is_empty());

        assert_eq!(store.set_calls(), 2);
        assert_eq!(store.remove_calls(), 2);
    }

    #[test]
    fn removing_from_unknown_feature_is_counted_but_harmless() {
        let mut store = InMemoryFeatureStore::new();
        store.remove_feature_state("missing", &["selected"]);
        assert!(store.is_empty());
        assert_eq!(store.remove_calls(), 1);
    }
}
