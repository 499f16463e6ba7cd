//! Markdown campaign strategy report.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use resonance_campaign_models::{CampaignAnalysis, CampaignLocationRecord, Strategy};

use crate::{
    mean, percentage,
    targeting::{
        HIGH_PRIORITY_AFFINITY, TargetLocation, bottom_by_affinity, hidden_goldmine_targeting,
        rally_base_targeting, top_by_affinity,
    },
};

/// Resource split across strategies, in report order.
pub const RESOURCE_ALLOCATION: &[(Strategy, u8)] = &[
    (Strategy::RallyTheBase, 40),
    (Strategy::HiddenGoldmine, 35),
    (Strategy::BringThemOver, 20),
    (Strategy::DeepConversion, 5),
];

/// File name for a saved report: `campaign_report_<candidate>_<location>.md`.
#[must_use]
pub fn report_filename(analysis: &CampaignAnalysis) -> String {
    format!(
        "campaign_report_{}_{}.md",
        slug(analysis.candidate_name()),
        slug(analysis.location())
    )
}

/// Lowercases and replaces anything that is not alphanumeric with `_`.
#[must_use]
pub fn slug(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Renders the full campaign report.
#[must_use]
pub fn campaign_report(analysis: &CampaignAnalysis, generated_at: DateTime<Utc>) -> String {
    let records = &analysis.records;
    let mut out = String::new();

    writeln!(
        out,
        "# Campaign Strategy Report: {} vs {}",
        analysis.candidate_name(),
        analysis.opponent_name()
    )
    .unwrap();
    writeln!(out).unwrap();
    writeln!(out, "**Location:** {}", analysis.location()).unwrap();
    if let Some(base) = &analysis.metadata.candidate_base {
        writeln!(out, "**Candidate base:** {base}").unwrap();
    }
    writeln!(
        out,
        "**Generated:** {}",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    )
    .unwrap();
    writeln!(out).unwrap();

    executive_summary(&mut out, records);
    rally_section(&mut out, records);
    goldmine_section(&mut out, records);
    brief_section(&mut out, records, Strategy::BringThemOver);
    brief_section(&mut out, records, Strategy::DeepConversion);
    allocation_section(&mut out, records);

    out
}

fn executive_summary(out: &mut String, records: &[CampaignLocationRecord]) {
    writeln!(out, "## Executive Summary").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "Total locations analysed: {}", records.len()).unwrap();
    writeln!(out).unwrap();
    writeln!(out, "| Strategy | Locations | Share |").unwrap();
    writeln!(out, "|---|---|---|").unwrap();
    for strategy in Strategy::all() {
        let count = count_strategy(records, *strategy);
        writeln!(
            out,
            "| {strategy} | {count} | {}% |",
            percentage(count, records.len())
        )
        .unwrap();
    }
    writeln!(out).unwrap();
}

fn rally_section(out: &mut String, records: &[CampaignLocationRecord]) {
    writeln!(out, "## Rally the Base").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "{}", Strategy::RallyTheBase.description()).unwrap();
    writeln!(out).unwrap();

    let Some(t) = rally_base_targeting(records) else {
        writeln!(out, "No Rally the Base locations in this data set.").unwrap();
        writeln!(out).unwrap();
        return;
    };

    writeln!(out, "- Locations: {}", t.total_rally_locations).unwrap();
    writeln!(out, "- Average affinity: {:.3}", t.summary.average_affinity).unwrap();
    writeln!(
        out,
        "- Average popularity: {:.3}",
        t.summary.average_popularity
    )
    .unwrap();
    writeln!(
        out,
        "- Trailing the opponent: {} ({}%, urgency {})",
        t.swing_voters.count, t.swing_voters.percentage, t.swing_voters.urgency
    )
    .unwrap();
    writeln!(
        out,
        "- Less popular than party: {} ({}%, urgency {})",
        t.base_introduction.count, t.base_introduction.percentage, t.base_introduction.urgency
    )
    .unwrap();
    writeln!(out).unwrap();

    let rally: Vec<&CampaignLocationRecord> = records
        .iter()
        .filter(|r| r.strategy == Strategy::RallyTheBase)
        .collect();
    location_list(out, "Top locations by affinity", &top_by_affinity(&rally));
    location_list(out, "Lowest affinity locations", &bottom_by_affinity(&rally));

    if !t.issue_weaknesses.is_empty() {
        writeln!(out, "### Issue Weaknesses").unwrap();
        writeln!(out).unwrap();
        for w in &t.issue_weaknesses {
            writeln!(
                out,
                "- **{}**: {} locations ({}%, urgency {})",
                w.issue, w.group.count, w.group.percentage, w.group.urgency
            )
            .unwrap();
        }
        writeln!(out).unwrap();
    }

    writeln!(out, "### Actions").unwrap();
    writeln!(out).unwrap();
    if t.recommendations.is_empty() {
        writeln!(
            out,
            "- Maintain turnout operations across all {} locations",
            t.total_rally_locations
        )
        .unwrap();
    }
    for rec in &t.recommendations {
        writeln!(out, "- {rec}").unwrap();
    }
    writeln!(out).unwrap();
}

fn goldmine_section(out: &mut String, records: &[CampaignLocationRecord]) {
    writeln!(out, "## Hidden Goldmine").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "{}", Strategy::HiddenGoldmine.description()).unwrap();
    writeln!(out).unwrap();

    let g = hidden_goldmine_targeting(records);

    writeln!(
        out,
        "- Less popular than party across all data: {} ({}%)",
        g.less_popular_than_party, g.less_popular_than_party_percentage
    )
    .unwrap();

    if g.total_goldmine_locations == 0 {
        writeln!(out, "- No locations carry the Hidden Goldmine strategy.").unwrap();
        writeln!(out).unwrap();
        return;
    }

    writeln!(
        out,
        "- Locations: {} ({}% of total)",
        g.total_goldmine_locations, g.percentage_of_total
    )
    .unwrap();
    writeln!(
        out,
        "- High priority (affinity > {HIGH_PRIORITY_AFFINITY}): {}",
        g.high_priority_locations
    )
    .unwrap();
    writeln!(out).unwrap();
    location_list(out, "Top locations by affinity", &g.top_locations);
    location_list(out, "Lowest affinity locations", &g.bottom_locations);
}

fn brief_section(out: &mut String, records: &[CampaignLocationRecord], strategy: Strategy) {
    let matching: Vec<&CampaignLocationRecord> =
        records.iter().filter(|r| r.strategy == strategy).collect();

    writeln!(out, "## {strategy}").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "{}", strategy.description()).unwrap();
    writeln!(out).unwrap();
    writeln!(out, "- Locations: {}", matching.len()).unwrap();
    if let Some(avg) = mean(matching.iter().map(|r| r.popularity)) {
        writeln!(out, "- Average popularity: {avg:.3}").unwrap();
    }
    writeln!(out).unwrap();
}

fn allocation_section(out: &mut String, records: &[CampaignLocationRecord]) {
    writeln!(out, "## Resource Allocation").unwrap();
    writeln!(out).unwrap();
    for (strategy, share) in RESOURCE_ALLOCATION {
        writeln!(
            out,
            "- {strategy}: {share}% ({} locations)",
            count_strategy(records, *strategy)
        )
        .unwrap();
    }
}

fn location_list(out: &mut String, title: &str, locations: &[TargetLocation]) {
    if locations.is_empty() {
        return;
    }
    writeln!(out, "### {title}").unwrap();
    writeln!(out).unwrap();
    for l in locations {
        writeln!(
            out,
            "- {}: affinity {:.3}, popularity {:.3}",
            l.label, l.affinity, l.popularity
        )
        .unwrap();
    }
    writeln!(out).unwrap();
}

fn count_strategy(records: &[CampaignLocationRecord], strategy: Strategy) -> usize {
    records.iter().filter(|r| r.strategy == strategy).count()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use resonance_campaign_models::{AnalysisMetadata, BasePopularityStatus, PopularityStatus};

    use super::*;

    fn record(strategy: Strategy, affinity: f64, geohash: &str) -> CampaignLocationRecord {
        CampaignLocationRecord {
            latitude: 40.0,
            longitude: -74.0,
            affinity,
            popularity: 0.5,
            strategy,
            segment: String::new(),
            popularity_status: PopularityStatus::TrailingOpponent,
            base_popularity_status: BasePopularityStatus::LessPopularThanParty,
            tags: BTreeMap::new(),
            issue_statuses: BTreeMap::new(),
            geohash: Some(geohash.to_string()),
            opponent_popularity: None,
            base_popularity: None,
        }
    }

    fn analysis() -> CampaignAnalysis {
        CampaignAnalysis {
            metadata: AnalysisMetadata {
                candidate_name: Some("Jane Doe".to_string()),
                opponent_name: Some("John Roe".to_string()),
                location: Some("New York, NY".to_string()),
                ..AnalysisMetadata::default()
            },
            records: vec![
                record(Strategy::RallyTheBase, 0.9, "dr5rega"),
                record(Strategy::RallyTheBase, 0.8, "dr5regb"),
                record(Strategy::HiddenGoldmine, 0.75, "dr5regc"),
                record(Strategy::DeepConversion, 0.1, "dr5regd"),
            ],
        }
    }

    #[test]
    fn filename_is_slugged() {
        assert_eq!(
            report_filename(&analysis()),
            "campaign_report_jane_doe_new_york__ny.md"
        );
    }

    #[test]
    fn report_contains_every_section() {
        let at = Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap();
        let md = campaign_report(&analysis(), at);

        assert!(md.starts_with("# Campaign Strategy Report: Jane Doe vs John Roe"));
        assert!(md.contains("**Generated:** 2024-10-01 12:00 UTC"));
        assert!(md.contains("| Rally the Base | 2 | 50% |"));
        assert!(md.contains("## Hidden Goldmine"));
        assert!(md.contains("- dr5rega: affinity 0.900"));
        assert!(md.contains("High priority (affinity > 0.7): 1"));
        assert!(md.contains("## Bring Them Over"));
        assert!(md.contains("- Deep Conversion: 5% (1 locations)"));
    }

    #[test]
    fn report_handles_missing_strategies() {
        let empty = CampaignAnalysis {
            metadata: AnalysisMetadata::default(),
            records: Vec::new(),
        };
        let md = campaign_report(&empty, Utc::now());
        assert!(md.contains("No Rally the Base locations"));
        assert!(md.contains("No locations carry the Hidden Goldmine strategy."));
    }

    #[test]
    fn party_gap_is_reported_without_goldmine_rows() {
        let analysis = CampaignAnalysis {
            metadata: AnalysisMetadata::default(),
            records: vec![
                record(Strategy::RallyTheBase, 0.9, "dr5rega"),
                record(Strategy::RallyTheBase, 0.8, "dr5regb"),
            ],
        };
        let md = campaign_report(&analysis, Utc::now());
        assert!(md.contains("- Less popular than party across all data: 2 (100%)"));
        assert!(md.contains("No locations carry the Hidden Goldmine strategy."));
    }
}
