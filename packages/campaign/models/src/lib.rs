#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Campaign location record types and targeting enumerations.
//!
//! A [`CampaignLocationRecord`] is one row of per-location campaign
//! metrics. Records are immutable input data: they are produced by CSV
//! ingestion or by the heatmap analysis pipeline and are only ever read
//! afterwards. The enumerations in this crate use the exact human-readable
//! labels that appear in campaign CSV files.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Affinity/popularity cut-off separating "high" from "low" in segment
/// classification.
pub const SEGMENT_THRESHOLD: f64 = 0.6;

/// Column prefix for issue-sentiment tag columns (e.g. `tag_gun_violence`).
pub const TAG_PREFIX: &str = "tag_";

/// Column prefix for per-issue popularity status columns.
pub const ISSUE_PREFIX: &str = "issue_";

/// Column suffix for per-issue popularity status columns.
pub const ISSUE_SUFFIX: &str = "_popularity_status";

/// Columns every campaign CSV must contain.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "latitude",
    "longitude",
    "affinity",
    "popularity",
    "strategy",
    "segment",
    "popularity_status",
    "base_popularity_status",
];

/// Optional columns recognised when present.
pub const OPTIONAL_COLUMNS: &[&str] = &["geohash", "opponent_popularity", "base_popularity"];

/// Campaign-targeting category assigned to each location.
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
pub enum Strategy {
    /// High affinity, high popularity: the core vote base.
    #[serde(rename = "Rally the Base")]
    #[strum(serialize = "Rally the Base")]
    RallyTheBase,
    /// High affinity, low popularity: supporters who need an introduction.
    #[serde(rename = "Hidden Goldmine")]
    #[strum(serialize = "Hidden Goldmine")]
    HiddenGoldmine,
    /// Low affinity, high popularity: soft support worth converting.
    #[serde(rename = "Bring Them Over")]
    #[strum(serialize = "Bring Them Over")]
    BringThemOver,
    /// Low affinity, low popularity: likely opponent territory.
    #[serde(rename = "Deep Conversion")]
    #[strum(serialize = "Deep Conversion")]
    DeepConversion,
}

impl Strategy {
    /// Returns all strategies in report order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::RallyTheBase,
            Self::HiddenGoldmine,
            Self::BringThemOver,
            Self::DeepConversion,
        ]
    }

    /// Maps a demographic segment to its targeting strategy.
    #[must_use]
    pub const fn for_segment(segment: Segment) -> Self {
        match segment {
            Segment::HighAffinityHighPopularity => Self::RallyTheBase,
            Segment::HighAffinityLowPopularity => Self::HiddenGoldmine,
            Segment::LowAffinityHighPopularity => Self::BringThemOver,
            Segment::LowAffinityLowPopularity => Self::DeepConversion,
        }
    }

    /// One-line description of what the strategy means for a campaign.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::RallyTheBase => {
                "High affinity and high popularity. This is the main vote base; focus on mobilization."
            }
            Self::HiddenGoldmine => {
                "High affinity but low popularity. These supporters need the candidate introduced."
            }
            Self::BringThemOver => {
                "Low affinity but high popularity. Campaign on the candidate's personal appeal."
            }
            Self::DeepConversion => {
                "Low affinity and low popularity. Probably opponent base; long-term relationship building."
            }
        }
    }
}

/// Affinity/popularity quadrant of a location.
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
pub enum Segment {
    /// `HA-HP`
    #[serde(rename = "HA-HP")]
    #[strum(serialize = "HA-HP")]
    HighAffinityHighPopularity,
    /// `HA-LP`
    #[serde(rename = "HA-LP")]
    #[strum(serialize = "HA-LP")]
    HighAffinityLowPopularity,
    /// `LA-HP`
    #[serde(rename = "LA-HP")]
    #[strum(serialize = "LA-HP")]
    LowAffinityHighPopularity,
    /// `LA-LP`
    #[serde(rename = "LA-LP")]
    #[strum(serialize = "LA-LP")]
    LowAffinityLowPopularity,
}

impl Segment {
    /// Classifies a location by its affinity and popularity scores using
    /// [`SEGMENT_THRESHOLD`] (inclusive) for both axes.
    #[must_use]
    pub fn classify(affinity: f64, popularity: f64) -> Self {
        let high_affinity = affinity >= SEGMENT_THRESHOLD;
        let high_popularity = popularity >= SEGMENT_THRESHOLD;
        match (high_affinity, high_popularity) {
            (true, true) => Self::HighAffinityHighPopularity,
            (true, false) => Self::HighAffinityLowPopularity,
            (false, true) => Self::LowAffinityHighPopularity,
            (false, false) => Self::LowAffinityLowPopularity,
        }
    }
}

/// Candidate popularity relative to the opponent.
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
pub enum PopularityStatus {
    /// The opponent is clearly more popular.
    #[serde(rename = "Trailing Opponent")]
    #[strum(serialize = "Trailing Opponent")]
    TrailingOpponent,
    /// The candidate is clearly more popular.
    #[serde(rename = "Leading Opponent")]
    #[strum(serialize = "Leading Opponent")]
    LeadingOpponent,
    /// Within the comparison band.
    #[serde(rename = "Similar Popularity")]
    #[strum(serialize = "Similar Popularity")]
    SimilarPopularity,
}

impl PopularityStatus {
    /// Returns all statuses.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::TrailingOpponent,
            Self::LeadingOpponent,
            Self::SimilarPopularity,
        ]
    }
}

/// Candidate popularity relative to the candidate's own party base.
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
pub enum BasePopularityStatus {
    /// The party is more popular than the candidate.
    #[serde(rename = "Less Popular than Party")]
    #[strum(serialize = "Less Popular than Party")]
    LessPopularThanParty,
    /// The candidate outperforms the party.
    #[serde(rename = "More Popular than Party")]
    #[strum(serialize = "More Popular than Party")]
    MorePopularThanParty,
    /// Within the comparison band.
    #[serde(rename = "Similar Popularity to Party")]
    #[strum(serialize = "Similar Popularity to Party")]
    SimilarPopularityToParty,
}

impl BasePopularityStatus {
    /// Returns all statuses.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::LessPopularThanParty,
            Self::MorePopularThanParty,
            Self::SimilarPopularityToParty,
        ]
    }
}

/// Candidate popularity among people who follow a given issue.
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
pub enum IssuePopularityStatus {
    /// Below the area average for this issue.
    #[serde(rename = "Candidate Less Popular with this Issue")]
    #[strum(serialize = "Candidate Less Popular with this Issue")]
    CandidateLessPopular,
    /// Above the area average for this issue.
    #[serde(rename = "Candidate More Popular with this Issue")]
    #[strum(serialize = "Candidate More Popular with this Issue")]
    CandidateMorePopular,
    /// Within the comparison band.
    #[serde(rename = "Similar Popularity")]
    #[strum(serialize = "Similar Popularity")]
    SimilarPopularity,
    /// No tag data at this location.
    #[serde(rename = "Unknown")]
    #[strum(serialize = "Unknown")]
    Unknown,
}

impl IssuePopularityStatus {
    /// Returns all statuses.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::CandidateLessPopular,
            Self::CandidateMorePopular,
            Self::SimilarPopularity,
            Self::Unknown,
        ]
    }
}

/// One row of per-location campaign metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignLocationRecord {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Voter affinity score in `[0, 1]`.
    pub affinity: f64,
    /// Candidate popularity in `[0, 1]`.
    pub popularity: f64,
    /// Targeting strategy.
    pub strategy: Strategy,
    /// Free-form demographic label (usually one of the [`Segment`] codes).
    pub segment: String,
    /// Popularity relative to the opponent.
    pub popularity_status: PopularityStatus,
    /// Popularity relative to the party base.
    pub base_popularity_status: BasePopularityStatus,
    /// Issue-sentiment tags keyed by name without the `tag_` prefix.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Per-issue popularity status keyed by issue name.
    #[serde(default)]
    pub issue_statuses: BTreeMap<String, IssuePopularityStatus>,
    /// Geohash cell of the point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geohash: Option<String>,
    /// Opponent popularity at the point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_popularity: Option<f64>,
    /// Party base popularity at the point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_popularity: Option<f64>,
}

impl CampaignLocationRecord {
    /// Returns the raw value of an issue tag.
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// Returns an issue tag parsed as a number, when it is one.
    #[must_use]
    pub fn tag_value(&self, name: &str) -> Option<f64> {
        self.tag(name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Returns the status for an issue, if the record carries one.
    #[must_use]
    pub fn issue_status(&self, issue: &str) -> Option<IssuePopularityStatus> {
        self.issue_statuses.get(issue).copied()
    }

    /// `(popularity - opponent_popularity) * 100`, when the opponent value
    /// is known.
    #[must_use]
    pub fn net_popularity(&self) -> Option<f64> {
        self.opponent_popularity
            .map(|opp| (self.popularity - opp) * 100.0)
    }

    /// `(popularity - base_popularity) * 100`, when the base value is known.
    #[must_use]
    pub fn net_base_popularity(&self) -> Option<f64> {
        self.base_popularity
            .map(|base| (self.popularity - base) * 100.0)
    }

    /// Weighted blend of affinity and popularity used to rank hotspots.
    #[must_use]
    pub fn hotspot_score(&self) -> f64 {
        self.affinity.mul_add(0.6, self.popularity * 0.4)
    }

    /// `[latitude, longitude]` pair.
    #[must_use]
    pub const fn coordinate(&self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }

    /// Short display label: the geohash when known, else the coordinate.
    #[must_use]
    pub fn label(&self) -> String {
        self.geohash.clone().unwrap_or_else(|| {
            format!("{:.4},{:.4}", self.latitude, self.longitude)
        })
    }

    /// Returns the string value of a categorical column, using the same
    /// names as the CSV header.
    ///
    /// Returns `None` for columns the record does not have.
    #[must_use]
    pub fn categorical_value(&self, column: &str) -> Option<String> {
        match column {
            "strategy" => Some(self.strategy.to_string()),
            "segment" => Some(self.segment.clone()),
            "popularity_status" => Some(self.popularity_status.to_string()),
            "base_popularity_status" => Some(self.base_popularity_status.to_string()),
            "geohash" => self.geohash.clone(),
            _ => {
                if let Some(issue) = issue_name_from_column(column) {
                    return self.issue_status(issue).map(|s| s.to_string());
                }
                column
                    .strip_prefix(TAG_PREFIX)
                    .and_then(|tag| self.tag(tag))
                    .map(ToString::to_string)
            }
        }
    }
}

/// Extracts the issue name from an `issue_<name>_popularity_status`
/// column header.
#[must_use]
pub fn issue_name_from_column(column: &str) -> Option<&str> {
    column
        .strip_prefix(ISSUE_PREFIX)
        .and_then(|rest| rest.strip_suffix(ISSUE_SUFFIX))
        .filter(|name| !name.is_empty())
}

/// Builds the `issue_<name>_popularity_status` column header for an issue.
#[must_use]
pub fn issue_column(issue: &str) -> String {
    format!("{ISSUE_PREFIX}{issue}{ISSUE_SUFFIX}")
}

/// Exact-match strategic location filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategicFilter {
    /// Required strategy.
    pub strategy: Strategy,
    /// Required popularity status.
    pub popularity_status: PopularityStatus,
    /// Required base popularity status.
    pub base_popularity_status: BasePopularityStatus,
}

impl StrategicFilter {
    /// Returns `true` when all three fields of `record` equal the filter.
    #[must_use]
    pub fn matches(&self, record: &CampaignLocationRecord) -> bool {
        record.strategy == self.strategy
            && record.popularity_status == self.popularity_status
            && record.base_popularity_status == self.base_popularity_status
    }

    /// Human-readable description of the filter.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "strategy: {}, popularity_status: {}, base_popularity_status: {}",
            self.strategy, self.popularity_status, self.base_popularity_status
        )
    }
}

/// A single criterion value: a numeric threshold, one category, or a set
/// of accepted categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionValue {
    /// Numeric threshold (`min_affinity`, `min_popularity`).
    Number(f64),
    /// A single accepted value.
    One(String),
    /// A set of accepted values.
    Many(Vec<String>),
}

impl CriterionValue {
    /// Returns the accepted categorical values.
    ///
    /// A numeric criterion is rendered as its string form.
    #[must_use]
    pub fn accepted(&self) -> Vec<String> {
        match self {
            Self::Number(n) => vec![n.to_string()],
            Self::One(s) => vec![s.clone()],
            Self::Many(values) => values.clone(),
        }
    }
}

/// Column name to criterion map, applied in key order.
pub type FilterCriteria = BTreeMap<String, CriterionValue>;

/// The current filtered group of coordinates used as the geographic
/// signal for insights and content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationGroup {
    /// Short descriptive tag chosen by the caller.
    pub tag: String,
    /// Description of how the group was built.
    pub description: String,
    /// `[latitude, longitude]` pairs.
    pub coordinates: Vec<[f64; 2]>,
    /// Number of coordinates.
    pub total_locations: usize,
    /// Human-readable list of the filters that produced the group.
    pub filters_applied: Vec<String>,
    /// When the group was created.
    pub created_at: DateTime<Utc>,
}

/// Entry in the location group history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHistoryEntry {
    /// Group tag.
    pub tag: String,
    /// Number of locations in the group.
    pub total_locations: usize,
    /// When the group was created.
    pub created_at: DateTime<Utc>,
}

impl From<&LocationGroup> for LocationHistoryEntry {
    fn from(group: &LocationGroup) -> Self {
        Self {
            tag: group.tag.clone(),
            total_locations: group.total_locations,
            created_at: group.created_at,
        }
    }
}

/// Describes where an analysis came from and who it is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    /// Candidate name.
    pub candidate_name: Option<String>,
    /// Opponent name.
    pub opponent_name: Option<String>,
    /// Political base (`progressive`, `conservative`, `center`).
    pub candidate_base: Option<String>,
    /// Location query used for the analysis.
    pub location: Option<String>,
    /// Age demographic filter.
    pub age: Option<String>,
    /// Gender demographic filter.
    pub gender: Option<String>,
    /// Issue tags analysed.
    #[serde(default)]
    pub tag_names: Vec<String>,
    /// Tag and issue columns of the source, including ones whose cells
    /// are all blank.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Source of the records (CSV path or `qloo`).
    pub source: String,
}

/// A set of records together with their metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignAnalysis {
    /// Who and where.
    pub metadata: AnalysisMetadata,
    /// The location records, in ingestion order.
    pub records: Vec<CampaignLocationRecord>,
}

impl CampaignAnalysis {
    /// Candidate name, or `"Candidate"` when unknown.
    #[must_use]
    pub fn candidate_name(&self) -> &str {
        self.metadata.candidate_name.as_deref().unwrap_or("Candidate")
    }

    /// Opponent name, or `"Opponent"` when unknown.
    #[must_use]
    pub fn opponent_name(&self) -> &str {
        self.metadata.opponent_name.as_deref().unwrap_or("Opponent")
    }

    /// Location label, or `"Location"` when unknown.
    #[must_use]
    pub fn location(&self) -> &str {
        self.metadata.location.as_deref().unwrap_or("Location")
    }

    /// Sorted, de-duplicated issue names present in any record.
    #[must_use]
    pub fn issue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .flat_map(|r| r.issue_statuses.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Sorted, de-duplicated tag names present in any record.
    #[must_use]
    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .flat_map(|r| r.tags.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// One data-quality problem found during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQualityIssue {
    /// 1-based data row number (the header is row 0).
    pub row: usize,
    /// Column name.
    pub column: String,
    /// Offending raw value.
    pub value: String,
    /// What is wrong with it.
    pub reason: String,
}

impl std::fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "row {}: column '{}' value '{}': {}",
            self.row, self.column, self.value, self.reason
        )
    }
}

/// Result of checking a campaign CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQualityReport {
    /// Number of data rows examined.
    pub rows_checked: usize,
    /// Number of rows that passed every check.
    pub valid_rows: usize,
    /// Every problem found, in row order.
    pub issues: Vec<DataQualityIssue>,
}

impl DataQualityReport {
    /// Returns `true` when no issues were found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}
