#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request and response types for the Qloo cultural-intelligence API,
//! plus the demographic vocabularies accepted by campaign analysis.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// An entity returned by `/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntity {
    /// Qloo entity ID.
    pub entity_id: String,
    /// Display name.
    pub name: String,
    /// Entity type URNs.
    #[serde(default)]
    pub types: Vec<String>,
}

/// A tag returned by `/v2/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QlooTag {
    /// Tag URN.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// One point of a heatmap response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapPoint {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Geohash cell.
    pub geohash: Option<String>,
    /// Affinity in `[0, 1]`.
    pub affinity: f64,
    /// Popularity in `[0, 1]`.
    pub popularity: f64,
    /// Rank of the affinity score.
    pub affinity_rank: Option<f64>,
}

/// Parameters for a heatmap query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapRequest {
    /// Free-text location, e.g. `"New York, NY"`.
    pub location_query: String,
    /// Interest entity IDs.
    #[serde(default)]
    pub entity_ids: Vec<String>,
    /// Interest tag IDs.
    #[serde(default)]
    pub tag_ids: Vec<String>,
    /// Audience URNs.
    #[serde(default)]
    pub audience_ids: Vec<String>,
    /// Age bracket.
    pub age: Option<AgeGroup>,
    /// Gender.
    pub gender: Option<Gender>,
    /// Heatmap boundary (`geohashes`, `city`, `neighborhood`).
    pub boundary: Option<String>,
    /// Maximum number of points.
    pub limit: u32,
}

/// Category of an insights query.
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
pub enum InsightCategory {
    /// Brands.
    Brands,
    /// Movies.
    Movies,
    /// TV shows.
    TvShows,
    /// Musical artists.
    Artists,
    /// Interest tags.
    Tags,
    /// Places.
    Places,
}

impl InsightCategory {
    /// All categories in report order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Brands,
            Self::Movies,
            Self::TvShows,
            Self::Artists,
            Self::Tags,
            Self::Places,
        ]
    }

    /// The `filter.type` value sent to `/v2/insights`.
    #[must_use]
    pub const fn filter_type(self) -> &'static str {
        match self {
            Self::Brands => "urn:entity:brand",
            Self::Movies => "urn:entity:movie",
            Self::TvShows => "urn:entity:tv_show",
            Self::Artists => "urn:entity:artist",
            Self::Tags => "urn:tag",
            Self::Places => "urn:entity:place",
        }
    }

    /// Number of results requested per category.
    #[must_use]
    pub const fn default_limit(self) -> u32 {
        match self {
            Self::Brands | Self::Places => 10,
            Self::Movies | Self::TvShows | Self::Artists => 5,
            Self::Tags => 15,
        }
    }

    /// Heading used in reports.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Brands => "Brand Preferences",
            Self::Movies => "Movie Preferences",
            Self::TvShows => "TV Show Preferences",
            Self::Artists => "Music & Artist Preferences",
            Self::Tags => "Interest Tags",
            Self::Places => "Place Preferences",
        }
    }
}

/// Signals for an insights query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightSignals {
    /// WKT polygon for `signal.location`.
    pub location_wkt: String,
    /// Insights age bracket.
    pub age: Option<InsightsAge>,
    /// Gender.
    pub gender: Option<Gender>,
}

/// One ranked result of an insights query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightItem {
    /// Entity or tag ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Affinity of the signal audience for this item.
    pub affinity: Option<f64>,
    /// Overall popularity.
    pub popularity: Option<f64>,
    /// Tag or entity subtype.
    pub subtype: Option<String>,
}

/// A candidate's political base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PoliticalBase {
    /// Progressive.
    Progressive,
    /// Conservative.
    Conservative,
    /// Center, and the fallback for anything unrecognised.
    Center,
}

impl PoliticalBase {
    /// Case-insensitive lookup; unknown labels map to [`Self::Center`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "progressive" => Self::Progressive,
            "conservative" => Self::Conservative,
            _ => Self::Center,
        }
    }

    /// Audience URN for heatmap queries.
    #[must_use]
    pub const fn audience_urn(self) -> &'static str {
        match self {
            Self::Progressive => "urn:audience:political_preferences:politically_progressive",
            Self::Conservative => "urn:audience:political_preferences:politically_conservative",
            Self::Center => "urn:audience:political_preferences:center",
        }
    }
}

/// Age brackets accepted by heatmap analysis.
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
pub enum AgeGroup {
    /// `24_and_younger`
    #[serde(rename = "24_and_younger")]
    #[strum(serialize = "24_and_younger")]
    UpTo24,
    /// `25_to_29`
    #[serde(rename = "25_to_29")]
    #[strum(serialize = "25_to_29")]
    From25To29,
    /// `30_to_34`
    #[serde(rename = "30_to_34")]
    #[strum(serialize = "30_to_34")]
    From30To34,
    /// `35_and_younger`
    #[serde(rename = "35_and_younger")]
    #[strum(serialize = "35_and_younger")]
    UpTo35,
    /// `36_to_55`
    #[serde(rename = "36_to_55")]
    #[strum(serialize = "36_to_55")]
    From36To55,
    /// `35_to_44`
    #[serde(rename = "35_to_44")]
    #[strum(serialize = "35_to_44")]
    From35To44,
    /// `45_to_54`
    #[serde(rename = "45_to_54")]
    #[strum(serialize = "45_to_54")]
    From45To54,
    /// `55_and_older`
    #[serde(rename = "55_and_older")]
    #[strum(serialize = "55_and_older")]
    From55,
}

impl AgeGroup {
    /// All accepted brackets.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::UpTo24,
            Self::From25To29,
            Self::From30To34,
            Self::UpTo35,
            Self::From36To55,
            Self::From35To44,
            Self::From45To54,
            Self::From55,
        ]
    }

    /// Collapses the bracket to the coarser set the insights endpoint
    /// accepts.
    #[must_use]
    pub const fn insights_age(self) -> InsightsAge {
        match self {
            Self::UpTo24 | Self::From25To29 | Self::From30To34 | Self::UpTo35 => {
                InsightsAge::UpTo35
            }
            Self::From35To44 | Self::From45To54 | Self::From36To55 => InsightsAge::From36To55,
            Self::From55 => InsightsAge::From55,
        }
    }
}

/// Age brackets accepted by the insights endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum InsightsAge {
    /// `35_and_younger`
    #[serde(rename = "35_and_younger")]
    #[strum(serialize = "35_and_younger")]
    UpTo35,
    /// `36_to_55`
    #[serde(rename = "36_to_55")]
    #[strum(serialize = "36_to_55")]
    From36To55,
    /// `55_and_older`
    #[serde(rename = "55_and_older")]
    #[strum(serialize = "55_and_older")]
    From55,
}

/// Gender filter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Gender {
    /// `male`
    Male,
    /// `female`
    Female,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn base_maps_to_audience_urn() {
        assert_eq!(
            PoliticalBase::from_label("Progressive").audience_urn(),
            "urn:audience:political_preferences:politically_progressive"
        );
        assert_eq!(
            PoliticalBase::from_label("conservative").audience_urn(),
            "urn:audience:political_preferences:politically_conservative"
        );
        assert_eq!(
            PoliticalBase::from_label("libertarian"),
            PoliticalBase::Center
        );
    }

    #[test]
    fn every_age_group_collapses_for_insights() {
        assert_eq!(AgeGroup::all().len(), 8);
        assert_eq!(
            AgeGroup::from_str("25_to_29").unwrap().insights_age(),
            InsightsAge::UpTo35
        );
        assert_eq!(
            AgeGroup::From35To44.insights_age().to_string(),
            "36_to_55"
        );
        assert_eq!(AgeGroup::From55.insights_age(), InsightsAge::From55);
        assert!(AgeGroup::from_str("18_to_24").is_err());
    }

    #[test]
    fn gender_parses_case_insensitively() {
        assert_eq!(Gender::from_str("Female").unwrap(), Gender::Female);
        assert_eq!(Gender::Male.to_string(), "male");
        assert!(Gender::from_str("other").is_err());
    }

    #[test]
    fn insight_categories_have_filter_types_and_limits() {
        assert_eq!(InsightCategory::TvShows.filter_type(), "urn:entity:tv_show");
        assert_eq!(InsightCategory::TvShows.to_string(), "tv_shows");
        assert_eq!(InsightCategory::Tags.default_limit(), 15);
        assert_eq!(InsightCategory::Brands.default_limit(), 10);
        assert_eq!(
            serde_json::to_value(InsightCategory::Places).unwrap(),
            serde_json::json!("places")
        );
    }
}
