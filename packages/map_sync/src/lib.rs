#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Synchronizes a renderer's per-ward feature state with the latest map
//! layer.
//!
//! Three channels are tracked independently and never touch each other's
//! keys:
//!
//! - color attributes (`demPct`, `repPct`, `margin`, `totalVotes`,
//!   `isEstimate`), replaced wholesale when the layer changes
//! - `opacity`, written only for wards whose value changed
//! - `selected` / `hovered`, each held by at most one ward
//!
//! [`MapStateSync`] takes `&mut self` for every write, so the store always
//! has a single writer.

pub mod layer;
pub mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use layer::{COLOR_KEYS, ChangeDetection, DEFAULT_SAMPLE_SIZE, MapLayer, MapWardState};
pub use store::{FeatureState, FeatureStateStore, InMemoryFeatureStore};

/// Feature-state key of the uncertainty channel.
pub const OPACITY_KEY: &str = "opacity";
/// Feature-state key of the selection flag.
pub const SELECTED_KEY: &str = "selected";
/// Feature-state key of the hover flag.
pub const HOVERED_KEY: &str = "hovered";

/// Map synchronization settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MapSyncConfig {
    pub change_detection: ChangeDetection,
    /// Wards compared in [`ChangeDetection::Sampled`] mode.
    pub sample_size: usize,
}

impl Default for MapSyncConfig {
    fn default() -> Self {
        Self {
            change_detection: ChangeDetection::Sampled,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

/// Result of a sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing was written.
    Unchanged,
    /// Store calls made.
    Applied {
        /// Features whose previous attributes were removed.
        cleared: usize,
        /// Features written.
        written: usize,
    },
}

impl SyncOutcome {
    #[must_use]
    pub const fn is_unchanged(self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Number of features written.
    #[must_use]
    pub const fn written(self) -> usize {
        match self {
            Self::Unchanged => 0,
            Self::Applied { written, .. } => written,
        }
    }
}

/// Single writer over a [`FeatureStateStore`].
#[derive(Debug)]
pub struct MapStateSync<S: FeatureStateStore> {
    store: S,
    config: MapSyncConfig,
    layer: Option<MapLayer>,
    opacity: BTreeMap<String, f64>,
    selected: Option<String>,
    hovered: Option<String>,
}

impl<S: FeatureStateStore> MapStateSync<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, MapSyncConfig::default())
    }

    #[must_use]
    pub const fn with_config(store: S, config: MapSyncConfig) -> Self {
        Self {
            store,
            config,
            layer: None,
            opacity: BTreeMap::new(),
            selected: None,
            hovered: None,
        }
    }

    /// Paints `layer` unless it matches the current one.
    ///
    /// On a change, the color keys of every previously painted ward are
    /// removed first, then every ward of `layer` is written.
    pub fn apply_layer(&mut self, layer: MapLayer) -> SyncOutcome {
        if let Some(current) = &self.layer
            && !self.config.change_detection.changed(
                current,
                &layer,
                self.config.sample_size,
            )
        {
            log::debug!("Map layer unchanged ({} wards)", layer.len());
            return SyncOutcome::Unchanged;
        }

        let cleared = self.clear_colors();
        for ward in &layer.wards {
            self.store
                .set_feature_state(&ward.ward_id, &ward.to_feature_state());
        }
        let written = layer.len();
        self.layer = Some(layer);

        log::debug!("Map layer applied: cleared {cleared}, wrote {written}");
        SyncOutcome::Applied { cleared, written }
    }

    /// Removes the color keys of every painted ward. Returns how many wards
    /// were cleared.
    pub fn clear_layer(&mut self) -> usize {
        let cleared = self.clear_colors();
        self.layer = None;
        cleared
    }

    fn clear_colors(&mut self) -> usize {
        let Some(previous) = &self.layer else {
            return 0;
        };
        for ward in &previous.wards {
            self.store.remove_feature_state(&ward.ward_id, &COLOR_KEYS);
        }
        previous.len()
    }

    /// The layer currently painted.
    #[must_use]
    pub const fn layer(&self) -> Option<&MapLayer> {
        self.layer.as_ref()
    }

    /// Replaces the opacity overrides. Wards no longer present lose their
    /// override; wards whose value is new or different are written.
    pub fn apply_opacity(&mut self, opacity: BTreeMap<String, f64>) -> SyncOutcome {
        let mut cleared = 0;
        for ward_id in self.opacity.keys() {
            if !opacity.contains_key(ward_id) {
                self.store.remove_feature_state(ward_id, &[OPACITY_KEY]);
                cleared += 1;
            }
        }

        let mut written = 0;
        for (ward_id, value) in &opacity {
            let unchanged = self
                .opacity
                .get(ward_id)
                .is_some_and(|previous| previous.total_cmp(value).is_eq());
            if !unchanged {
                let mut state = FeatureState::new();
                state.insert(OPACITY_KEY.to_string(), Value::from(*value));
                self.store.set_feature_state(ward_id, &state);
                written += 1;
            }
        }

        self.opacity = opacity;

        if cleared == 0 && written == 0 {
            return SyncOutcome::Unchanged;
        }
        log::debug!("Opacity applied: cleared {cleared}, wrote {written}");
        SyncOutcome::Applied { cleared, written }
    }

    /// Removes every opacity override. Returns how many wards were cleared.
    pub fn clear_opacity(&mut self) -> usize {
        let previous = std::mem::take(&mut self.opacity);
        for ward_id in previous.keys() {
            self.store.remove_feature_state(ward_id, &[OPACITY_KEY]);
        }
        previous.len()
    }

    /// Moves the selection flag to `ward_id` (or nowhere).
    pub fn set_selected(&mut self, ward_id: Option<&str>) {
        move_flag(&mut self.store, &mut self.selected, ward_id, SELECTED_KEY);
    }

    /// Moves the hover flag to `ward_id` (or nowhere).
    pub fn set_hovered(&mut self, ward_id: Option<&str>) {
        move_flag(&mut self.store, &mut self.hovered, ward_id, HOVERED_KEY);
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    #[must_use]
    pub const fn config(&self) -> &MapSyncConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

/// Clears `key` on the current holder, then sets it on `next`.
fn move_flag<S: FeatureStateStore>(
    store: &mut S,
    holder: &mut Option<String>,
    next: Option<&str>,
    key: &str,
) {
    if holder.as_deref() == next {
        return;
    }

    if let Some(previous) = holder.take() {
        store.remove_feature_state(&previous, &[key]);
    }

    if let Some(ward_id) = next {
        let mut state = FeatureState::new();
        state.insert(key.to_string(), Value::Bool(true));
        store.set_feature_state(ward_id, &state);
        *holder = Some(ward_id.to_string());
    }
}
