//! Ward geography from boundary `GeoJSON`.
//!
//! Only feature properties are read; geometry is left to the renderer.

use std::collections::BTreeMap;

use geojson::{Feature, FeatureCollection, GeoJson, feature::Id};
use serde_json::Value;
use swing_map_election_models::WardMeta;

use crate::WardHistoryError;

/// Renders a property value as text. `null` counts as absent.
fn property_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// First present property among `keys`, or empty.
fn first_property(feature: &Feature, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| feature.property(key).and_then(property_text))
        .unwrap_or_default()
}

fn ward_id(feature: &Feature) -> Option<String> {
    feature
        .property("ward_id")
        .and_then(property_text)
        .or_else(|| {
            feature.id.as_ref().map(|id| match id {
                Id::String(s) => s.clone(),
                Id::Number(n) => n.to_string(),
            })
        })
        .filter(|id| !id.is_empty())
}

/// Ward id -> geography for every feature with a ward id.
///
/// The id is the `ward_id` property, else the feature id. District
/// properties accept either the long name or the short alias
/// (`congressional_district` or `cd`, and so on). Features without
/// properties or without an id are skipped.
#[must_use]
pub fn extract_ward_metadata(collection: &FeatureCollection) -> BTreeMap<String, WardMeta> {
    let mut metadata = BTreeMap::new();
    let mut skipped = 0_usize;

    for feature in &collection.features {
        let id = feature
            .properties
            .as_ref()
            .and_then(|_| ward_id(feature));

        let Some(id) = id else {
            skipped += 1;
            continue;
        };

        metadata.insert(
            id,
            WardMeta {
                county: first_property(feature, &["county"]),
                municipality: first_property(feature, &["municipality"]),
                congressional_district: first_property(feature, &["congressional_district", "cd"]),
                state_senate_district: first_property(feature, &["state_senate_district", "sd"]),
                assembly_district: first_property(feature, &["assembly_district", "ad"]),
            },
        );
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} boundary features without a ward id");
    }

    metadata
}

/// Parses boundary `GeoJSON` text and extracts its ward metadata.
///
/// # Errors
///
/// Returns [`WardHistoryError::GeoJson`] if the text is not `GeoJSON`, or
/// [`WardHistoryError::NotFeatureCollection`] if it is a lone geometry or
/// feature.
pub fn parse_boundaries(text: &str) -> Result<BTreeMap<String, WardMeta>, WardHistoryError> {
    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => Ok(extract_ward_metadata(&collection)),
        GeoJson::Feature(_) | GeoJson::Geometry(_) => Err(WardHistoryError::NotFeatureCollection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": null,
                "properties": {
                    "ward_id": "55025-001",
                    "county": "DANE",
                    "municipality": "CITY OF MADISON",
                    "congressional_district": "2",
                    "state_senate_district": "26",
                    "assembly_district": "77"
                }
            },
            {
                "type": "Feature",
                "id": "55009-004",
                "geometry": null,
                "properties": {"county": "BROWN", "cd": 8, "sd": "30", "ad": null}
            },
            {
                "type": "Feature",
                "id": 12,
                "geometry": null,
                "properties": {"county": "IRON"}
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": {"county": "NOWHERE"}
            },
            {
                "type": "Feature",
                "id": "no-props",
                "geometry": null,
                "properties": null
            }
        ]
    }"#;

    #[test]
    fn reads_long_property_names() {
        let metadata = parse_boundaries(BOUNDARIES).unwrap();
        let madison = &metadata["55025-001"];
        assert_eq!(madison.county, "DANE");
        assert_eq!(madison.municipality, "CITY OF MADISON");
        assert_eq!(madison.congressional_district, "2");
        assert_eq!(madison.state_senate_district, "26");
        assert_eq!(madison.assembly_district, "77");
    }

    #[test]
    fn falls_back_to_feature_id_and_short_aliases() {
        let metadata = parse_boundaries(BOUNDARIES).unwrap();
        let brown = &metadata["55009-004"];
        assert_eq!(brown.congressional_district, "8");
        assert_eq!(brown.state_senate_district, "30");
        assert_eq!(brown.assembly_district, "");
        assert_eq!(brown.municipality, "");
        assert_eq!(metadata["12"].county, "IRON");
    }

    #[test]
    fn skips_features_without_id_or_properties() {
        let metadata = parse_boundaries(BOUNDARIES).unwrap();
        assert_eq!(metadata.len(), 3);
        assert!(!metadata.contains_key("no-props"));
    }

    #[test]
    fn rejects_non_collections() {
        let point = r#"{"type": "Point", "coordinates": [-89.4, 43.07]}"#;
        assert!(matches!(
            parse_boundaries(point),
            Err(WardHistoryError::NotFeatureCollection)
        ));
        assert!(matches!(
            parse_boundaries("not json"),
            Err(WardHistoryError::GeoJson(_))
        ));
    }
}
