//! Shape of a loaded data set: columns, category counts, and a sample.

use std::collections::BTreeMap;

use resonance_campaign_models::{
    CampaignLocationRecord, REQUIRED_COLUMNS, TAG_PREFIX, issue_column,
};
use serde::{Deserialize, Serialize};

/// Rows included in [`DataStructure::sample_rows`].
pub const SAMPLE_ROWS: usize = 3;

/// Overview of a record set as it would appear in CSV form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStructure {
    /// Number of rows.
    pub total_rows: usize,
    /// Number of columns.
    pub total_columns: usize,
    /// Column names in CSV order.
    pub columns: Vec<String>,
    /// Value counts for each categorical status column.
    pub value_counts: BTreeMap<String, BTreeMap<String, usize>>,
    /// The first few rows, keyed by column.
    pub sample_rows: Vec<BTreeMap<String, String>>,
}

/// Describes the columns and category distribution of `records`.
#[must_use]
pub fn data_structure(records: &[CampaignLocationRecord]) -> DataStructure {
    let columns = columns_for(records);

    let mut counted: Vec<String> = vec![
        "strategy".to_string(),
        "popularity_status".to_string(),
        "base_popularity_status".to_string(),
    ];
    counted.extend(
        columns
            .iter()
            .filter(|c| c.starts_with("issue_"))
            .cloned(),
    );

    let mut value_counts = BTreeMap::new();
    for column in counted {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for r in records {
            if let Some(v) = r.categorical_value(&column) {
                *counts.entry(v).or_default() += 1;
            }
        }
        value_counts.insert(column, counts);
    }

    let sample_rows = records
        .iter()
        .take(SAMPLE_ROWS)
        .map(|r| {
            columns
                .iter()
                .map(|c| (c.clone(), column_value(r, c).unwrap_or_default()))
                .collect()
        })
        .collect();

    DataStructure {
        total_rows: records.len(),
        total_columns: columns.len(),
        columns,
        value_counts,
        sample_rows,
    }
}

fn columns_for(records: &[CampaignLocationRecord]) -> Vec<String> {
    let mut columns: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| (*c).to_string()).collect();
    if records.iter().any(|r| r.geohash.is_some()) {
        columns.push("geohash".to_string());
    }
    if records.iter().any(|r| r.opponent_popularity.is_some()) {
        columns.push("opponent_popularity".to_string());
    }
    if records.iter().any(|r| r.base_popularity.is_some()) {
        columns.push("base_popularity".to_string());
    }

    let mut tags: Vec<&String> = records.iter().flat_map(|r| r.tags.keys()).collect();
    tags.sort();
    tags.dedup();
    columns.extend(tags.into_iter().map(|t| format!("{TAG_PREFIX}{t}")));

    let mut issues: Vec<&String> = records
        .iter()
        .flat_map(|r| r.issue_statuses.keys())
        .collect();
    issues.sort();
    issues.dedup();
    columns.extend(issues.into_iter().map(|i| issue_column(i)));

    columns
}

fn column_value(record: &CampaignLocationRecord, column: &str) -> Option<String> {
    match column {
        "latitude" => Some(record.latitude.to_string()),
        "longitude" => Some(record.longitude.to_string()),
        "affinity" => Some(record.affinity.to_string()),
        "popularity" => Some(record.popularity.to_string()),
        "opponent_popularity" => record.opponent_popularity.map(|v| v.to_string()),
        "base_popularity" => record.base_popularity.map(|v| v.to_string()),
        other => record.categorical_value(other),
    }
}

#[cfg(test)]
mod tests {
    use resonance_campaign_models::{
        BasePopularityStatus, IssuePopularityStatus, PopularityStatus, Strategy,
    };

    use super::*;

    fn record(strategy: Strategy, issue: IssuePopularityStatus) -> CampaignLocationRecord {
        CampaignLocationRecord {
            latitude: 1.5,
            longitude: 2.5,
            affinity: 0.5,
            popularity: 0.25,
            strategy,
            segment: "LA-LP".to_string(),
            popularity_status: PopularityStatus::SimilarPopularity,
            base_popularity_status: BasePopularityStatus::SimilarPopularityToParty,
            tags: BTreeMap::from([("economy".to_string(), "0.4".to_string())]),
            issue_statuses: BTreeMap::from([("economy".to_string(), issue)]),
            geohash: None,
            opponent_popularity: Some(0.3),
            base_popularity: None,
        }
    }

    #[test]
    fn counts_categories_and_lists_columns() {
        let records = vec![
            record(Strategy::DeepConversion, IssuePopularityStatus::Unknown),
            record(
                Strategy::DeepConversion,
                IssuePopularityStatus::CandidateLessPopular,
            ),
            record(Strategy::BringThemOver, IssuePopularityStatus::Unknown),
            record(Strategy::BringThemOver, IssuePopularityStatus::Unknown),
        ];
        let s = data_structure(&records);

        assert_eq!(s.total_rows, 4);
        assert_eq!(
            s.columns[REQUIRED_COLUMNS.len()..],
            [
                "opponent_popularity".to_string(),
                "tag_economy".to_string(),
                "issue_economy_popularity_status".to_string(),
            ]
        );
        assert_eq!(s.total_columns, s.columns.len());
        assert_eq!(s.value_counts["strategy"]["Deep Conversion"], 2);
        assert_eq!(s.value_counts["issue_economy_popularity_status"]["Unknown"], 3);
        assert_eq!(s.sample_rows.len(), SAMPLE_ROWS);
        assert_eq!(s.sample_rows[0]["popularity"], "0.25");
        assert_eq!(s.sample_rows[0]["tag_economy"], "0.4");
    }

    #[test]
    fn empty_input_has_only_required_columns() {
        let s = data_structure(&[]);
        assert_eq!(s.total_rows, 0);
        assert_eq!(s.total_columns, REQUIRED_COLUMNS.len());
        assert!(s.sample_rows.is_empty());
        assert!(s.value_counts["strategy"].is_empty());
    }
}
