//! Per-ward lookup tables that refine the statewide swing and turnout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use swing_map_election_models::{Classification, Region};

/// Region and classification tables accompanying a parameter set.
///
/// Every table is optional; an absent entry contributes no offset. Field
/// names match the auxiliary maps of the local computation channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WardAdjustments {
    /// Ward id -> region.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ward_regions: BTreeMap<String, Region>,
    /// Region -> swing offset in points, added to the statewide swing.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub regional_swing: BTreeMap<Region, f64>,
    /// Ward id -> density classification.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ward_classifications: BTreeMap<String, Classification>,
    /// Region -> turnout offset in percent.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub regional_turnout: BTreeMap<Region, f64>,
    /// Classification -> turnout offset in percent.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub demographic_turnout: BTreeMap<Classification, f64>,
}

impl WardAdjustments {
    /// The ward's classification, [`Classification::Rural`] when unknown.
    #[must_use]
    pub fn classification(&self, ward_id: &str) -> Classification {
        self.ward_classifications
            .get(ward_id)
            .copied()
            .unwrap_or_default()
    }

    /// Statewide swing plus the ward's regional offset, when the ward has
    /// a region and that region has an offset.
    #[must_use]
    pub fn effective_swing(&self, ward_id: &str, base_swing: f64) -> f64 {
        self.ward_regions
            .get(ward_id)
            .and_then(|region| self.regional_swing.get(region))
            .map_or(base_swing, |offset| base_swing + offset)
    }

    /// Statewide turnout change plus the regional and demographic offsets
    /// that apply to the ward. Unlike [`Self::classification`], a ward
    /// without an explicit classification receives no demographic offset.
    #[must_use]
    pub fn effective_turnout(&self, ward_id: &str, base_turnout: f64) -> f64 {
        let regional = self
            .ward_regions
            .get(ward_id)
            .and_then(|region| self.regional_turnout.get(region))
            .copied()
            .unwrap_or(0.0);

        let demographic = self
            .ward_classifications
            .get(ward_id)
            .and_then(|class| self.demographic_turnout.get(class))
            .copied()
            .unwrap_or(0.0);

        base_turnout + regional + demographic
    }

    /// Whether no table carries any entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ward_regions.is_empty()
            && self.regional_swing.is_empty()
            && self.ward_classifications.is_empty()
            && self.regional_turnout.is_empty()
            && self.demographic_turnout.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WardAdjustments {
        let mut adj = WardAdjustments::default();
        adj.ward_regions.insert("mke".into(), Region::MilwaukeeMetro);
        adj.ward_regions.insert("rural".into(), Region::Rural);
        adj.regional_swing.insert(Region::MilwaukeeMetro, 2.0);
        adj.regional_turnout.insert(Region::MilwaukeeMetro, 5.0);
        adj.ward_classifications
            .insert("mke".into(), Classification::Urban);
        adj.demographic_turnout.insert(Classification::Urban, -3.0);
        adj
    }

    #[test]
    fn swing_offset_needs_region_and_offset() {
        let adj = sample();
        assert!((adj.effective_swing("mke", 1.0) - 3.0).abs() < 1e-12);
        assert!((adj.effective_swing("rural", 1.0) - 1.0).abs() < 1e-12);
        assert!((adj.effective_swing("unknown", 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn turnout_offsets_stack() {
        let adj = sample();
        assert!((adj.effective_turnout("mke", 10.0) - 12.0).abs() < 1e-12);
        assert!((adj.effective_turnout("rural", 10.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn unclassified_wards_are_rural() {
        let adj = sample();
        assert_eq!(adj.classification("mke"), Classification::Urban);
        assert_eq!(adj.classification("elsewhere"), Classification::Rural);
    }

    #[test]
    fn empty_tables_are_omitted_on_the_wire() {
        let value = serde_json::to_value(WardAdjustments::default()).unwrap();
        assert_eq!(value, serde_json::json!({}));

        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["wardRegions"]["mke"], "milwaukee_metro");
        assert_eq!(value["demographicTurnout"]["urban"], -3.0);
    }
}
