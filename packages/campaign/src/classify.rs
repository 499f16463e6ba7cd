//! Builds campaign records from heatmap points.
//!
//! Candidate and opponent points are inner-joined on their coordinates;
//! the party base and each issue tag are left-joined. Every comparison
//! uses a symmetric band of [`COMPARISON_BAND`] percentage points.

use std::collections::BTreeMap;

use resonance_campaign_models::{
    BasePopularityStatus, CampaignLocationRecord, IssuePopularityStatus, PopularityStatus,
    Segment, Strategy,
};

use crate::{CampaignError, mean};

/// Width of the "similar" band, in percentage points.
pub const COMPARISON_BAND: f64 = 2.0;

/// A scored location returned by a heatmap query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Geohash cell, if the source provides one.
    pub geohash: Option<String>,
    /// Affinity score in `[0, 1]`.
    pub affinity: f64,
    /// Popularity score in `[0, 1]`.
    pub popularity: f64,
}

impl ScoredPoint {
    fn key(&self) -> (u64, u64) {
        (self.latitude.to_bits(), self.longitude.to_bits())
    }

    fn is_usable(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.popularity.is_finite()
    }
}

/// Heatmap inputs for one candidate analysis.
#[derive(Debug, Clone, Default)]
pub struct HeatmapInputs {
    /// Candidate heatmap.
    pub candidate: Vec<ScoredPoint>,
    /// Opponent heatmap.
    pub opponent: Vec<ScoredPoint>,
    /// Party base audience heatmap.
    pub base: Vec<ScoredPoint>,
    /// Candidate heatmap within each issue tag, keyed by tag column name
    /// without the `tag_` prefix.
    pub tags: BTreeMap<String, Vec<ScoredPoint>>,
}

/// Classifies `(candidate - opponent) * 100`.
#[must_use]
pub fn popularity_status(net_popularity: f64) -> PopularityStatus {
    if net_popularity > COMPARISON_BAND {
        PopularityStatus::LeadingOpponent
    } else if net_popularity < -COMPARISON_BAND {
        PopularityStatus::TrailingOpponent
    } else {
        PopularityStatus::SimilarPopularity
    }
}

/// Classifies `(candidate - base) * 100`. A missing base value counts as
/// similar.
#[must_use]
pub fn base_popularity_status(net_base_popularity: Option<f64>) -> BasePopularityStatus {
    match net_base_popularity {
        Some(net) if net > COMPARISON_BAND => BasePopularityStatus::MorePopularThanParty,
        Some(net) if net < -COMPARISON_BAND => BasePopularityStatus::LessPopularThanParty,
        _ => BasePopularityStatus::SimilarPopularityToParty,
    }
}

/// Classifies `(tag - mean(tag)) * 100`. A missing value is
/// [`IssuePopularityStatus::Unknown`].
#[must_use]
pub fn issue_status(net_issue_popularity: Option<f64>) -> IssuePopularityStatus {
    match net_issue_popularity {
        None => IssuePopularityStatus::Unknown,
        Some(net) if net > COMPARISON_BAND => IssuePopularityStatus::CandidateMorePopular,
        Some(net) if net < -COMPARISON_BAND => IssuePopularityStatus::CandidateLessPopular,
        Some(_) => IssuePopularityStatus::SimilarPopularity,
    }
}

/// Merges heatmap inputs into classified campaign records.
///
/// Output order follows the candidate heatmap.
///
/// # Errors
///
/// Returns [`CampaignError::NoOverlap`] if the candidate or opponent
/// heatmap is empty or they share no coordinates.
pub fn build_records(inputs: &HeatmapInputs) -> Result<Vec<CampaignLocationRecord>, CampaignError> {
    let candidate: Vec<&ScoredPoint> = inputs.candidate.iter().filter(|p| p.is_usable()).collect();
    if candidate.is_empty() {
        return Err(CampaignError::NoOverlap {
            message: "no candidate heatmap data".to_string(),
        });
    }

    let opponent = index_popularity(&inputs.opponent);
    if opponent.is_empty() {
        return Err(CampaignError::NoOverlap {
            message: "no opponent heatmap data".to_string(),
        });
    }

    let base = index_popularity(&inputs.base);
    let tags: BTreeMap<&str, BTreeMap<(u64, u64), f64>> = inputs
        .tags
        .iter()
        .map(|(name, points)| (name.as_str(), index_popularity(points)))
        .collect();

    let joined: Vec<(&ScoredPoint, f64)> = candidate
        .into_iter()
        .filter_map(|p| opponent.get(&p.key()).map(|opp| (p, *opp)))
        .collect();

    if joined.is_empty() {
        return Err(CampaignError::NoOverlap {
            message: "candidate and opponent heatmaps share no locations".to_string(),
        });
    }

    // Issue averages are taken over the merged rows that have tag data.
    let tag_means: BTreeMap<&str, Option<f64>> = tags
        .iter()
        .map(|(name, values)| {
            let avg = mean(joined.iter().filter_map(|(p, _)| values.get(&p.key()).copied()));
            (*name, avg)
        })
        .collect();

    let records = joined
        .into_iter()
        .map(|(point, opponent_popularity)| {
            let segment = Segment::classify(point.affinity, point.popularity);
            let base_popularity = base.get(&point.key()).copied();

            let mut tag_values = BTreeMap::new();
            let mut issue_statuses = BTreeMap::new();
            for (name, values) in &tags {
                let value = values.get(&point.key()).copied();
                let net = value
                    .zip(tag_means.get(name).copied().flatten())
                    .map(|(v, avg)| (v - avg) * 100.0);
                if let Some(v) = value {
                    tag_values.insert((*name).to_string(), v.to_string());
                }
                issue_statuses.insert((*name).to_string(), issue_status(net));
            }

            CampaignLocationRecord {
                latitude: point.latitude,
                longitude: point.longitude,
                affinity: point.affinity,
                popularity: point.popularity,
                strategy: Strategy::for_segment(segment),
                segment: segment.to_string(),
                popularity_status: popularity_status(
                    (point.popularity - opponent_popularity) * 100.0,
                ),
                base_popularity_status: base_popularity_status(
                    base_popularity.map(|b| (point.popularity - b) * 100.0),
                ),
                tags: tag_values,
                issue_statuses,
                geohash: point.geohash.clone(),
                opponent_popularity: Some(opponent_popularity),
                base_popularity,
            }
        })
        .collect::<Vec<_>>();

    log::info!("Classified {} merged locations", records.len());
    Ok(records)
}

/// Indexes usable points by coordinate. The first point wins on
/// duplicate coordinates.
fn index_popularity(points: &[ScoredPoint]) -> BTreeMap<(u64, u64), f64> {
    let mut index = BTreeMap::new();
    for p in points.iter().filter(|p| p.is_usable()) {
        index.entry(p.key()).or_insert(p.popularity);
    }
    index
}

/// Normalises a free-text tag name into a column-safe key
/// (`"gun violence"` becomes `"gun_violence"`).
#[must_use]
pub fn tag_key(tag_name: &str) -> String {
    tag_name.trim().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64, affinity: f64, popularity: f64) -> ScoredPoint {
        ScoredPoint {
            latitude: lat,
            longitude: lon,
            geohash: None,
            affinity,
            popularity,
        }
    }

    #[test]
    fn status_bands_are_exclusive_at_the_edges() {
        assert_eq!(popularity_status(2.5), PopularityStatus::LeadingOpponent);
        assert_eq!(popularity_status(2.0), PopularityStatus::SimilarPopularity);
        assert_eq!(popularity_status(-2.0), PopularityStatus::SimilarPopularity);
        assert_eq!(popularity_status(-2.01), PopularityStatus::TrailingOpponent);

        assert_eq!(
            base_popularity_status(Some(-5.0)),
            BasePopularityStatus::LessPopularThanParty
        );
        assert_eq!(
            base_popularity_status(None),
            BasePopularityStatus::SimilarPopularityToParty
        );

        assert_eq!(issue_status(None), IssuePopularityStatus::Unknown);
        assert_eq!(
            issue_status(Some(3.0)),
            IssuePopularityStatus::CandidateMorePopular
        );
        assert_eq!(
            issue_status(Some(0.0)),
            IssuePopularityStatus::SimilarPopularity
        );
    }

    #[test]
    fn candidate_and_opponent_are_inner_joined() {
        let inputs = HeatmapInputs {
            candidate: vec![point(1.0, 1.0, 0.9, 0.8), point(2.0, 2.0, 0.3, 0.2)],
            opponent: vec![point(1.0, 1.0, 0.5, 0.5), point(3.0, 3.0, 0.5, 0.5)],
            ..HeatmapInputs::default()
        };
        let records = build_records(&inputs).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.segment, "HA-HP");
        assert_eq!(r.strategy, Strategy::RallyTheBase);
        assert_eq!(r.popularity_status, PopularityStatus::LeadingOpponent);
        assert_eq!(
            r.base_popularity_status,
            BasePopularityStatus::SimilarPopularityToParty
        );
        assert_eq!(r.opponent_popularity, Some(0.5));
    }

    #[test]
    fn base_and_tags_are_left_joined() {
        let mut tags = BTreeMap::new();
        tags.insert(
            "economy".to_string(),
            vec![point(1.0, 1.0, 0.0, 0.9), point(2.0, 2.0, 0.0, 0.1)],
        );
        let inputs = HeatmapInputs {
            candidate: vec![
                point(1.0, 1.0, 0.7, 0.4),
                point(2.0, 2.0, 0.7, 0.4),
                point(3.0, 3.0, 0.7, 0.4),
            ],
            opponent: vec![
                point(1.0, 1.0, 0.0, 0.4),
                point(2.0, 2.0, 0.0, 0.4),
                point(3.0, 3.0, 0.0, 0.4),
            ],
            base: vec![point(1.0, 1.0, 0.0, 0.9)],
            tags,
        };
        let records = build_records(&inputs).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].strategy, Strategy::HiddenGoldmine);
        assert_eq!(
            records[0].base_popularity_status,
            BasePopularityStatus::LessPopularThanParty
        );
        assert_eq!(records[1].base_popularity, None);

        assert_eq!(
            records[0].issue_status("economy"),
            Some(IssuePopularityStatus::CandidateMorePopular)
        );
        assert_eq!(
            records[1].issue_status("economy"),
            Some(IssuePopularityStatus::CandidateLessPopular)
        );
        assert_eq!(
            records[2].issue_status("economy"),
            Some(IssuePopularityStatus::Unknown)
        );
        assert_eq!(records[0].tag_value("economy"), Some(0.9));
        assert_eq!(records[2].tag("economy"), None);
    }

    #[test]
    fn empty_inputs_report_no_overlap() {
        let err = build_records(&HeatmapInputs::default()).unwrap_err();
        assert!(matches!(err, CampaignError::NoOverlap { .. }));

        let disjoint = HeatmapInputs {
            candidate: vec![point(1.0, 1.0, 0.5, 0.5)],
            opponent: vec![point(5.0, 5.0, 0.5, 0.5)],
            ..HeatmapInputs::default()
        };
        assert!(matches!(
            build_records(&disjoint).unwrap_err(),
            CampaignError::NoOverlap { .. }
        ));
    }

    #[test]
    fn tag_keys_replace_spaces() {
        assert_eq!(tag_key(" gun violence "), "gun_violence");
    }
}
