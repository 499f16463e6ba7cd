//! Targeting breakdowns for the "Rally the Base" and "Hidden Goldmine"
//! strategies.

use std::cmp::Ordering;

use resonance_campaign_models::{
    BasePopularityStatus, CampaignLocationRecord, IssuePopularityStatus, PopularityStatus,
    Strategy,
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::{mean, percentage, round_to};

/// Number of locations listed per group.
pub const TOP_LOCATIONS: usize = 5;

/// Affinity above which a hidden goldmine location is high priority.
pub const HIGH_PRIORITY_AFFINITY: f64 = 0.7;

/// How urgently a group of locations needs attention.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Urgency {
    /// Act first.
    High,
    /// Act soon.
    Medium,
    /// Monitor.
    Low,
}

/// Compact view of one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetLocation {
    /// Geohash or coordinate label.
    pub label: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Affinity, rounded to three places.
    pub affinity: f64,
    /// Popularity, rounded to three places.
    pub popularity: f64,
}

impl From<&CampaignLocationRecord> for TargetLocation {
    fn from(record: &CampaignLocationRecord) -> Self {
        Self {
            label: record.label(),
            latitude: record.latitude,
            longitude: record.longitude,
            affinity: round_to(record.affinity, 3),
            popularity: round_to(record.popularity, 3),
        }
    }
}

/// A counted subset of the rally locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetGroup {
    /// Locations in the group.
    pub count: usize,
    /// Share of the rally locations, in percent.
    pub percentage: f64,
    /// Urgency derived from the share.
    pub urgency: Urgency,
    /// Highest-affinity locations in the group.
    pub top_locations: Vec<TargetLocation>,
}

/// Rally locations where the candidate is weak on one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueWeakness {
    /// Issue name.
    pub issue: String,
    /// The weak locations.
    #[serde(flatten)]
    pub group: TargetGroup,
}

/// Averages over all rally locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RallySummary {
    /// Mean affinity.
    pub average_affinity: f64,
    /// Mean popularity.
    pub average_popularity: f64,
    /// Highest-affinity locations.
    pub strongest_locations: Vec<TargetLocation>,
    /// Mean `[latitude, longitude]`, rounded to four places.
    pub center: [f64; 2],
}

/// Breakdown of the "Rally the Base" locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RallyTargeting {
    /// Number of rally locations.
    pub total_rally_locations: usize,
    /// Rally locations trailing the opponent.
    pub swing_voters: TargetGroup,
    /// Rally locations where the party outperforms the candidate.
    pub base_introduction: TargetGroup,
    /// Per-issue weaknesses, in issue name order.
    pub issue_weaknesses: Vec<IssueWeakness>,
    /// Averages and anchor locations.
    pub summary: RallySummary,
    /// Suggested resource allocation.
    pub recommendations: Vec<String>,
    /// Locations covered by at least one group.
    pub total_targetable_locations: usize,
}

/// Breaks down the "Rally the Base" locations.
///
/// Returns `None` when there are no rally locations.
#[must_use]
pub fn rally_base_targeting(records: &[CampaignLocationRecord]) -> Option<RallyTargeting> {
    let rally: Vec<&CampaignLocationRecord> = records
        .iter()
        .filter(|r| r.strategy == Strategy::RallyTheBase)
        .collect();
    if rally.is_empty() {
        return None;
    }
    let total = rally.len();

    let swing: Vec<&CampaignLocationRecord> = rally
        .iter()
        .copied()
        .filter(|r| r.popularity_status == PopularityStatus::TrailingOpponent)
        .collect();
    let swing_pct = percentage(swing.len(), total);
    let swing_voters = TargetGroup {
        count: swing.len(),
        percentage: swing_pct,
        urgency: if swing_pct > 15.0 { Urgency::High } else { Urgency::Medium },
        top_locations: top_by_affinity(&swing),
    };

    let intro: Vec<&CampaignLocationRecord> = rally
        .iter()
        .copied()
        .filter(|r| r.base_popularity_status == BasePopularityStatus::LessPopularThanParty)
        .collect();
    let intro_pct = percentage(intro.len(), total);
    let base_introduction = TargetGroup {
        count: intro.len(),
        percentage: intro_pct,
        urgency: if intro_pct > 25.0 { Urgency::High } else { Urgency::Medium },
        top_locations: top_by_affinity(&intro),
    };

    let mut issues: Vec<String> = rally
        .iter()
        .flat_map(|r| r.issue_statuses.keys().cloned())
        .collect();
    issues.sort();
    issues.dedup();

    let mut targetable = vec![false; total];
    for (i, r) in rally.iter().enumerate() {
        targetable[i] = r.popularity_status == PopularityStatus::TrailingOpponent
            || r.base_popularity_status == BasePopularityStatus::LessPopularThanParty;
    }

    let mut issue_weaknesses = Vec::new();
    for issue in issues {
        let mut weak: Vec<(usize, &CampaignLocationRecord)> = rally
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, r)| {
                r.issue_status(&issue) == Some(IssuePopularityStatus::CandidateLessPopular)
            })
            .collect();
        if weak.is_empty() {
            continue;
        }
        for (i, _) in &weak {
            targetable[*i] = true;
        }

        // Weakest first, then strongest supporters.
        weak.sort_by(|(_, a), (_, b)| {
            compare_missing_last(a.tag_value(&issue), b.tag_value(&issue))
                .then_with(|| b.affinity.total_cmp(&a.affinity))
        });

        let pct = percentage(weak.len(), total);
        issue_weaknesses.push(IssueWeakness {
            issue,
            group: TargetGroup {
                count: weak.len(),
                percentage: pct,
                urgency: if pct > 20.0 {
                    Urgency::High
                } else if pct > 10.0 {
                    Urgency::Medium
                } else {
                    Urgency::Low
                },
                top_locations: weak
                    .iter()
                    .take(TOP_LOCATIONS)
                    .map(|(_, r)| TargetLocation::from(*r))
                    .collect(),
            },
        });
    }

    let summary = RallySummary {
        average_affinity: round_to(mean(rally.iter().map(|r| r.affinity)).unwrap_or(0.0), 3),
        average_popularity: round_to(mean(rally.iter().map(|r| r.popularity)).unwrap_or(0.0), 3),
        strongest_locations: top_by_affinity(&rally),
        center: [
            round_to(mean(rally.iter().map(|r| r.latitude)).unwrap_or(0.0), 4),
            round_to(mean(rally.iter().map(|r| r.longitude)).unwrap_or(0.0), 4),
        ],
    };

    let mut recommendations = Vec::new();
    if swing_voters.urgency == Urgency::High {
        recommendations.push(format!(
            "Allocate 40% of resources to {} swing voter locations trailing the opponent",
            swing_voters.count
        ));
    }
    if base_introduction.percentage > 15.0 {
        recommendations.push(format!(
            "Allocate 30% of resources to introducing the candidate in {} locations where the party outperforms them",
            base_introduction.count
        ));
    }
    let urgent_issues: Vec<&str> = issue_weaknesses
        .iter()
        .filter(|w| w.group.urgency == Urgency::High)
        .map(|w| w.issue.as_str())
        .collect();
    if !urgent_issues.is_empty() {
        recommendations.push(format!(
            "Allocate 30% of resources to issue campaigns on: {}",
            urgent_issues.join(", ")
        ));
    }

    Some(RallyTargeting {
        total_rally_locations: total,
        swing_voters,
        base_introduction,
        issue_weaknesses,
        summary,
        recommendations,
        total_targetable_locations: targetable.iter().filter(|t| **t).count(),
    })
}

/// Where the party outperforms the candidate, and the "Hidden Goldmine"
/// locations inside that gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenGoldmineTargeting {
    /// Number of locations analysed.
    pub total_locations: usize,
    /// Locations where the candidate is less popular than the party.
    pub less_popular_than_party: usize,
    /// Share of all locations, in percent.
    pub less_popular_than_party_percentage: f64,
    /// Number of locations with the Hidden Goldmine strategy.
    pub total_goldmine_locations: usize,
    /// Share of all locations, in percent.
    pub percentage_of_total: f64,
    /// Goldmine locations with affinity above [`HIGH_PRIORITY_AFFINITY`].
    pub high_priority_locations: usize,
    /// Mean goldmine affinity. Absent without goldmine locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_affinity: Option<f64>,
    /// Mean goldmine popularity. Absent without goldmine locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_popularity: Option<f64>,
    /// Highest-affinity goldmine locations.
    pub top_locations: Vec<TargetLocation>,
    /// Lowest-affinity goldmine locations.
    pub bottom_locations: Vec<TargetLocation>,
}

/// Counts the locations less popular than the party across all records
/// and breaks down the "Hidden Goldmine" ones.
///
/// The party-gap count does not depend on the strategy column, so data
/// without Hidden Goldmine rows still reports it.
#[must_use]
pub fn hidden_goldmine_targeting(records: &[CampaignLocationRecord]) -> HiddenGoldmineTargeting {
    let goldmine: Vec<&CampaignLocationRecord> = records
        .iter()
        .filter(|r| r.strategy == Strategy::HiddenGoldmine)
        .collect();

    let lpp = records
        .iter()
        .filter(|r| r.base_popularity_status == BasePopularityStatus::LessPopularThanParty)
        .count();

    HiddenGoldmineTargeting {
        total_locations: records.len(),
        less_popular_than_party: lpp,
        less_popular_than_party_percentage: percentage(lpp, records.len()),
        total_goldmine_locations: goldmine.len(),
        percentage_of_total: percentage(goldmine.len(), records.len()),
        high_priority_locations: goldmine
            .iter()
            .filter(|r| r.affinity > HIGH_PRIORITY_AFFINITY)
            .count(),
        average_affinity: mean(goldmine.iter().map(|r| r.affinity)).map(|v| round_to(v, 3)),
        average_popularity: mean(goldmine.iter().map(|r| r.popularity)).map(|v| round_to(v, 3)),
        top_locations: top_by_affinity(&goldmine),
        bottom_locations: bottom_by_affinity(&goldmine),
    }
}

/// The [`TOP_LOCATIONS`] highest-affinity records. Ties keep input order.
#[must_use]
pub fn top_by_affinity(records: &[&CampaignLocationRecord]) -> Vec<TargetLocation> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.affinity.total_cmp(&a.affinity));
    sorted
        .into_iter()
        .take(TOP_LOCATIONS)
        .map(TargetLocation::from)
        .collect()
}

/// The [`TOP_LOCATIONS`] lowest-affinity records. Ties keep input order.
#[must_use]
pub fn bottom_by_affinity(records: &[&CampaignLocationRecord]) -> Vec<TargetLocation> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.affinity.total_cmp(&b.affinity));
    sorted
        .into_iter()
        .take(TOP_LOCATIONS)
        .map(TargetLocation::from)
        .collect()
}

fn compare_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn rally(
        affinity: f64,
        status: PopularityStatus,
        base: BasePopularityStatus,
    ) -> CampaignLocationRecord {
        CampaignLocationRecord {
            latitude: 40.0,
            longitude: -74.0,
            affinity,
            popularity: 0.7,
            strategy: Strategy::RallyTheBase,
            segment: "HA-HP".to_string(),
            popularity_status: status,
            base_popularity_status: base,
            tags: BTreeMap::new(),
            issue_statuses: BTreeMap::new(),
            geohash: None,
            opponent_popularity: None,
            base_popularity: None,
        }
    }

    fn with_issue(
        mut record: CampaignLocationRecord,
        issue: &str,
        value: f64,
        status: IssuePopularityStatus,
    ) -> CampaignLocationRecord {
        record.tags.insert(issue.to_string(), value.to_string());
        record.issue_statuses.insert(issue.to_string(), status);
        record
    }

    #[test]
    fn no_rally_locations_yields_none() {
        let mut r = rally(
            0.9,
            PopularityStatus::LeadingOpponent,
            BasePopularityStatus::MorePopularThanParty,
        );
        r.strategy = Strategy::DeepConversion;
        assert!(rally_base_targeting(&[r]).is_none());
    }

    #[test]
    fn swing_and_base_groups_use_share_thresholds() {
        use BasePopularityStatus::{LessPopularThanParty, MorePopularThanParty};
        use PopularityStatus::{LeadingOpponent, TrailingOpponent};

        let records = vec![
            rally(0.95, TrailingOpponent, MorePopularThanParty),
            rally(0.90, LeadingOpponent, LessPopularThanParty),
            rally(0.85, LeadingOpponent, MorePopularThanParty),
            rally(0.80, LeadingOpponent, MorePopularThanParty),
        ];
        let t = rally_base_targeting(&records).unwrap();
        assert_eq!(t.total_rally_locations, 4);
        assert_eq!(t.swing_voters.count, 1);
        assert!((t.swing_voters.percentage - 25.0).abs() < 1e-9);
        assert_eq!(t.swing_voters.urgency, Urgency::High);
        assert_eq!(t.base_introduction.urgency, Urgency::Medium);
        assert_eq!(t.total_targetable_locations, 2);
        assert_eq!(t.summary.strongest_locations[0].affinity, 0.95);
        assert_eq!(t.summary.center, [40.0, -74.0]);
        assert!(t.recommendations[0].starts_with("Allocate 40%"));
        assert!(t.recommendations[1].starts_with("Allocate 30%"));
    }

    #[test]
    fn issue_weaknesses_sort_weakest_first() {
        use BasePopularityStatus::MorePopularThanParty;
        use IssuePopularityStatus::{CandidateLessPopular, CandidateMorePopular};
        use PopularityStatus::LeadingOpponent;

        let records = vec![
            with_issue(
                rally(0.7, LeadingOpponent, MorePopularThanParty),
                "economy",
                0.30,
                CandidateLessPopular,
            ),
            with_issue(
                rally(0.9, LeadingOpponent, MorePopularThanParty),
                "economy",
                0.10,
                CandidateLessPopular,
            ),
            with_issue(
                rally(0.8, LeadingOpponent, MorePopularThanParty),
                "economy",
                0.90,
                CandidateMorePopular,
            ),
        ];
        let t = rally_base_targeting(&records).unwrap();
        assert_eq!(t.issue_weaknesses.len(), 1);
        let w = &t.issue_weaknesses[0];
        assert_eq!(w.issue, "economy");
        assert_eq!(w.group.count, 2);
        assert_eq!(w.group.urgency, Urgency::High);
        assert_eq!(w.group.top_locations[0].affinity, 0.9);
        assert_eq!(t.total_targetable_locations, 2);
        assert!(
            t.recommendations
                .iter()
                .any(|r| r.contains("issue campaigns on: economy"))
        );
    }

    #[test]
    fn goldmine_counts_high_priority_and_party_gap() {
        let mut records = vec![
            rally(
                0.9,
                PopularityStatus::LeadingOpponent,
                BasePopularityStatus::LessPopularThanParty,
            ),
            rally(
                0.75,
                PopularityStatus::LeadingOpponent,
                BasePopularityStatus::LessPopularThanParty,
            ),
            rally(
                0.65,
                PopularityStatus::LeadingOpponent,
                BasePopularityStatus::MorePopularThanParty,
            ),
            rally(
                0.5,
                PopularityStatus::LeadingOpponent,
                BasePopularityStatus::MorePopularThanParty,
            ),
        ];
        records[1].strategy = Strategy::HiddenGoldmine;
        records[2].strategy = Strategy::HiddenGoldmine;

        let g = hidden_goldmine_targeting(&records);
        assert_eq!(g.total_goldmine_locations, 2);
        assert_eq!(g.average_affinity, Some(0.7));
        assert!((g.percentage_of_total - 50.0).abs() < 1e-9);
        assert_eq!(g.less_popular_than_party, 2);
        assert_eq!(g.high_priority_locations, 1);
        assert_eq!(g.top_locations[0].affinity, 0.75);
        assert_eq!(g.bottom_locations[0].affinity, 0.65);
    }

    #[test]
    fn party_gap_is_counted_without_goldmine_rows() {
        let mut records = vec![
            rally(
                0.8,
                PopularityStatus::TrailingOpponent,
                BasePopularityStatus::LessPopularThanParty,
            ),
            rally(
                0.6,
                PopularityStatus::LeadingOpponent,
                BasePopularityStatus::LessPopularThanParty,
            ),
            rally(
                0.3,
                PopularityStatus::LeadingOpponent,
                BasePopularityStatus::MorePopularThanParty,
            ),
        ];
        records[2].strategy = Strategy::BringThemOver;

        let g = hidden_goldmine_targeting(&records);
        assert_eq!(g.total_locations, 3);
        assert_eq!(g.less_popular_than_party, 2);
        assert!((g.less_popular_than_party_percentage - 66.7).abs() < 1e-9);
        assert_eq!(g.total_goldmine_locations, 0);
        assert_eq!(g.average_affinity, None);
        assert!(g.top_locations.is_empty());

        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["lessPopularThanParty"], 2);
        assert!(json.get("averageAffinity").is_none());
    }

    #[test]
    fn urgency_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(Urgency::High).unwrap(),
            serde_json::json!("HIGH")
        );
        assert_eq!(Urgency::Medium.to_string(), "MEDIUM");
    }
}
