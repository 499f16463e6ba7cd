//! Location filters.
//!
//! [`filter_strategic`] is the exact-match filter over the three
//! targeting columns. [`filter_by_criteria`] is the general form used by
//! the agent tools: categorical columns accept one or more values and
//! `min_affinity` / `min_popularity` are inclusive thresholds.
//!
//! Both preserve input order and are idempotent.

use chrono::Utc;
use resonance_campaign_models::{
    CampaignLocationRecord, CriterionValue, FilterCriteria, LocationGroup, StrategicFilter,
    TAG_PREFIX, issue_name_from_column,
};

use crate::CampaignError;

/// Returns exactly the records whose strategy, popularity status, and base
/// popularity status all equal the filter's values.
#[must_use]
pub fn filter_strategic<'a>(
    records: &'a [CampaignLocationRecord],
    filter: &StrategicFilter,
) -> Vec<&'a CampaignLocationRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

/// Outcome of applying a criteria map.
#[derive(Debug, Clone)]
pub struct CriteriaOutcome<'a> {
    /// Matching records, in input order.
    pub records: Vec<&'a CampaignLocationRecord>,
    /// Human-readable description of each applied criterion.
    pub applied: Vec<String>,
    /// Criteria that named an unknown column and were ignored.
    pub skipped: Vec<String>,
}

/// Applies each criterion in key order.
///
/// A tag or issue column is known when it is listed in `columns` (the
/// source header) or carried by any record. Unknown columns are logged and reported in
/// [`CriteriaOutcome::skipped`] instead of failing the whole filter.
///
/// # Errors
///
/// Returns [`CampaignError::InvalidInput`] if a numeric threshold is given
/// a non-numeric value.
pub fn filter_by_criteria<'a>(
    records: &'a [CampaignLocationRecord],
    columns: &[String],
    criteria: &FilterCriteria,
) -> Result<CriteriaOutcome<'a>, CampaignError> {
    let mut current: Vec<&CampaignLocationRecord> = records.iter().collect();
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    log::info!("Starting with {} locations", current.len());

    for (column, value) in criteria {
        let before = current.len();

        match column.as_str() {
            "min_affinity" | "min_popularity" => {
                let CriterionValue::Number(threshold) = value else {
                    return Err(CampaignError::InvalidInput {
                        message: format!("{column} must be a number"),
                    });
                };
                let threshold = *threshold;
                if column == "min_affinity" {
                    current.retain(|r| r.affinity >= threshold);
                    applied.push(format!("affinity >= {threshold}"));
                } else {
                    current.retain(|r| r.popularity >= threshold);
                    applied.push(format!("popularity >= {threshold}"));
                }
            }
            other if is_known_column(other, columns, records) => {
                let accepted = value.accepted();
                current.retain(|r| {
                    r.categorical_value(other)
                        .is_some_and(|v| accepted.iter().any(|a| *a == v))
                });
                applied.push(format!("{other}: {}", accepted.join(", ")));
            }
            other => {
                log::warn!("Column '{other}' not found in data; skipping");
                skipped.push(other.to_string());
                continue;
            }
        }

        log::info!("Applied {column}: {before} -> {} locations", current.len());
    }

    log::info!("Final result: {} locations after all filters", current.len());

    Ok(CriteriaOutcome {
        records: current,
        applied,
        skipped,
    })
}

/// Returns `true` if `column` names a categorical column of the source or
/// of the records.
fn is_known_column(column: &str, columns: &[String], records: &[CampaignLocationRecord]) -> bool {
    if columns.iter().any(|c| c == column) {
        return true;
    }
    match column {
        "strategy" | "segment" | "popularity_status" | "base_popularity_status" => true,
        "geohash" => records.iter().any(|r| r.geohash.is_some()),
        _ => {
            if let Some(issue) = issue_name_from_column(column) {
                return records.iter().any(|r| r.issue_statuses.contains_key(issue));
            }
            column
                .strip_prefix(TAG_PREFIX)
                .is_some_and(|tag| records.iter().any(|r| r.tags.contains_key(tag)))
        }
    }
}

/// Packages filtered records as a named location group.
///
/// # Errors
///
/// Returns [`CampaignError::InvalidInput`] if `records` is empty.
pub fn build_location_group(
    tag: &str,
    records: &[&CampaignLocationRecord],
    filters_applied: Vec<String>,
) -> Result<LocationGroup, CampaignError> {
    if records.is_empty() {
        return Err(CampaignError::InvalidInput {
            message: "No locations found matching the filter criteria".to_string(),
        });
    }

    let coordinates: Vec<[f64; 2]> = records.iter().map(|r| r.coordinate()).collect();

    Ok(LocationGroup {
        tag: tag.to_string(),
        description: format!("Filtered locations: {}", filters_applied.join(", ")),
        total_locations: coordinates.len(),
        coordinates,
        filters_applied,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use resonance_campaign_models::{
        BasePopularityStatus, IssuePopularityStatus, PopularityStatus, Strategy,
    };

    use super::*;

    fn record(
        lat: f64,
        affinity: f64,
        strategy: Strategy,
        status: PopularityStatus,
        base: BasePopularityStatus,
    ) -> CampaignLocationRecord {
        CampaignLocationRecord {
            latitude: lat,
            longitude: -74.0,
            affinity,
            popularity: 0.5,
            strategy,
            segment: "HA-HP".to_string(),
            popularity_status: status,
            base_popularity_status: base,
            tags: BTreeMap::new(),
            issue_statuses: BTreeMap::from([(
                "economy".to_string(),
                IssuePopularityStatus::CandidateLessPopular,
            )]),
            geohash: None,
            opponent_popularity: None,
            base_popularity: None,
        }
    }

    fn sample() -> Vec<CampaignLocationRecord> {
        use BasePopularityStatus::{LessPopularThanParty, MorePopularThanParty};
        use PopularityStatus::{LeadingOpponent, TrailingOpponent};
        use Strategy::{HiddenGoldmine, RallyTheBase};
        vec![
            record(1.0, 0.9, RallyTheBase, TrailingOpponent, LessPopularThanParty),
            record(2.0, 0.8, RallyTheBase, LeadingOpponent, LessPopularThanParty),
            record(3.0, 0.7, HiddenGoldmine, TrailingOpponent, LessPopularThanParty),
            record(4.0, 0.6, RallyTheBase, TrailingOpponent, LessPopularThanParty),
            record(5.0, 0.5, RallyTheBase, TrailingOpponent, MorePopularThanParty),
        ]
    }

    fn rally_trailing_less() -> StrategicFilter {
        StrategicFilter {
            strategy: Strategy::RallyTheBase,
            popularity_status: PopularityStatus::TrailingOpponent,
            base_popularity_status: BasePopularityStatus::LessPopularThanParty,
        }
    }

    #[test]
    fn strategic_filter_returns_exact_matches_in_order() {
        let records = sample();
        let matched = filter_strategic(&records, &rally_trailing_less());
        let lats: Vec<f64> = matched.iter().map(|r| r.latitude).collect();
        assert_eq!(lats, vec![1.0, 4.0]);
    }

    #[test]
    fn strategic_filter_is_idempotent() {
        let records = sample();
        let filter = rally_trailing_less();
        let once: Vec<CampaignLocationRecord> = filter_strategic(&records, &filter)
            .into_iter()
            .cloned()
            .collect();
        let twice: Vec<CampaignLocationRecord> = filter_strategic(&once, &filter)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn strategic_filter_with_no_matches_is_empty() {
        let records = sample();
        let filter = StrategicFilter {
            strategy: Strategy::DeepConversion,
            ..rally_trailing_less()
        };
        assert!(filter_strategic(&records, &filter).is_empty());
    }

    #[test]
    fn criteria_combine_categorical_lists_and_thresholds() {
        let records = sample();
        let criteria: FilterCriteria = serde_json::from_value(serde_json::json!({
            "strategy": "Rally the Base",
            "popularity_status": ["Trailing Opponent", "Leading Opponent"],
            "min_affinity": 0.8,
        }))
        .unwrap();
        let outcome = filter_by_criteria(&records, &[], &criteria).unwrap();
        let lats: Vec<f64> = outcome.records.iter().map(|r| r.latitude).collect();
        assert_eq!(lats, vec![1.0, 2.0]);
        assert_eq!(outcome.applied.len(), 3);
        assert!(outcome.applied.contains(&"affinity >= 0.8".to_string()));
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn issue_columns_are_filterable() {
        let records = sample();
        let criteria: FilterCriteria = serde_json::from_value(serde_json::json!({
            "issue_economy_popularity_status": "Candidate Less Popular with this Issue",
        }))
        .unwrap();
        let outcome = filter_by_criteria(&records, &[], &criteria).unwrap();
        assert_eq!(outcome.records.len(), records.len());
    }

    #[test]
    fn unknown_columns_are_skipped() {
        let records = sample();
        let criteria: FilterCriteria = serde_json::from_value(serde_json::json!({
            "district": "North",
            "strategy": "Hidden Goldmine",
        }))
        .unwrap();
        let outcome = filter_by_criteria(&records, &[], &criteria).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped, vec!["district".to_string()]);
    }

    #[test]
    fn blank_header_column_matches_nothing() {
        let csv = "\
latitude,longitude,affinity,popularity,strategy,segment,popularity_status,base_popularity_status,tag_politics
40.71,-74.00,0.82,0.75,Rally the Base,HA-HP,Trailing Opponent,Less Popular than Party,
40.74,-73.99,0.71,0.32,Hidden Goldmine,HA-LP,Similar Popularity,Less Popular than Party,
";
        let records = crate::ingest::load_records(csv.as_bytes()).unwrap();
        let columns = crate::ingest::read_extra_columns(csv.as_bytes()).unwrap();
        assert_eq!(columns, vec!["tag_politics".to_string()]);

        let criteria: FilterCriteria =
            serde_json::from_value(serde_json::json!({ "tag_politics": "high" })).unwrap();
        let outcome = filter_by_criteria(&records, &columns, &criteria).unwrap();
        assert!(outcome.records.is_empty());
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.applied, vec!["tag_politics: high".to_string()]);

        let without_header = filter_by_criteria(&records, &[], &criteria).unwrap();
        assert_eq!(without_header.skipped, vec!["tag_politics".to_string()]);
    }

    #[test]
    fn non_numeric_threshold_is_rejected() {
        let records = sample();
        let criteria: FilterCriteria =
            serde_json::from_value(serde_json::json!({ "min_popularity": "high" })).unwrap();
        assert!(matches!(
            filter_by_criteria(&records, &[], &criteria),
            Err(CampaignError::InvalidInput { .. })
        ));
    }

    #[test]
    fn location_group_collects_coordinates() {
        let records = sample();
        let matched = filter_strategic(&records, &rally_trailing_less());
        let group =
            build_location_group("rally trailing", &matched, vec!["strategy".to_string()])
                .unwrap();
        assert_eq!(group.total_locations, 2);
        assert_eq!(group.coordinates[0], [1.0, -74.0]);
        assert_eq!(group.description, "Filtered locations: strategy");

        assert!(build_location_group("empty", &[], Vec::new()).is_err());
    }
}
