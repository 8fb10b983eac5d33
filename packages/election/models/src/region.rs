//! Wisconsin media-market regions.
//!
//! Regional swing and turnout offsets are keyed by these regions. A ward's
//! region is derived from its county; counties outside the three metro
//! groupings fall into [`Region::Rural`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::WardMeta;

/// A regional grouping of Wisconsin counties.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Region {
    /// Milwaukee, Waukesha, Ozaukee and Washington counties.
    MilwaukeeMetro,
    /// Dane county.
    MadisonMetro,
    /// Brown, Outagamie, Winnebago and Calumet counties.
    FoxValley,
    /// Everything else.
    Rural,
}

const MILWAUKEE_METRO_COUNTIES: &[&str] = &["MILWAUKEE", "WAUKESHA", "OZAUKEE", "WASHINGTON"];
const MADISON_METRO_COUNTIES: &[&str] = &["DANE"];
const FOX_VALLEY_COUNTIES: &[&str] = &["BROWN", "OUTAGAMIE", "WINNEBAGO", "CALUMET"];

impl Region {
    /// All regions, in display order.
    pub const ALL: [Self; 4] = [
        Self::MilwaukeeMetro,
        Self::MadisonMetro,
        Self::FoxValley,
        Self::Rural,
    ];

    /// Maps a county name (any case) to its region.
    #[must_use]
    pub fn for_county(county: &str) -> Self {
        let upper = county.trim().to_uppercase();
        let upper = upper.as_str();

        if MILWAUKEE_METRO_COUNTIES.contains(&upper) {
            Self::MilwaukeeMetro
        } else if MADISON_METRO_COUNTIES.contains(&upper) {
            Self::MadisonMetro
        } else if FOX_VALLEY_COUNTIES.contains(&upper) {
            Self::FoxValley
        } else {
            Self::Rural
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MilwaukeeMetro => "Milwaukee Metro",
            Self::MadisonMetro => "Madison Metro",
            Self::FoxValley => "Fox Valley",
            Self::Rural => "Rural",
        }
    }
}

/// Derives the ward id -> region table from ward metadata.
#[must_use]
pub fn build_ward_region_map(metadata: &BTreeMap<String, WardMeta>) -> BTreeMap<String, Region> {
    metadata
        .iter()
        .map(|(ward_id, meta)| (ward_id.clone(), Region::for_county(&meta.county)))
        .collect()
}
