//! Political analysis and targeting tools.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::Utc;
use resonance_agents_models::{
    CandidateAnalysisParams, FilterLocationsParams, FilterStrategicParams, LoadCampaignDataParams,
};
use resonance_campaign::classify::{HeatmapInputs, ScoredPoint, build_records, tag_key};
use resonance_campaign::filter::{
    CriteriaOutcome, build_location_group, filter_by_criteria, filter_strategic,
};
use resonance_campaign::ingest::{
    load_records_from_path, read_extra_columns_from_path, write_records,
};
use resonance_campaign::report::{campaign_report, report_filename, slug};
use resonance_campaign::summary::data_structure;
use resonance_campaign::targeting::{hidden_goldmine_targeting, rally_base_targeting};
use resonance_campaign::CampaignError;
use resonance_campaign_models::{
    AnalysisMetadata, CampaignAnalysis, StrategicFilter, TAG_PREFIX, issue_column,
};
use resonance_qloo::DEFAULT_HEATMAP_LIMIT;
use resonance_qloo_models::{AgeGroup, Gender, HeatmapPoint, HeatmapRequest, PoliticalBase};
use serde_json::json;

use super::sample_coordinates;
use crate::session::CampaignSession;
use crate::{AgentError, Services};

/// Data-quality issues included in a failed load result.
const MAX_REPORTED_ISSUES: usize = 20;

/// Political base assumed when none is given.
pub const DEFAULT_CANDIDATE_BASE: &str = "progressive";

/// Loads a campaign CSV as the session's analysis.
///
/// Data-quality failures are returned as a result listing the problems,
/// so the model can explain them.
///
/// # Errors
///
/// Returns [`AgentError`] if no path is available or the file cannot be
/// read.
pub fn load_campaign_data(
    services: &Services,
    session: &mut CampaignSession,
    params: LoadCampaignDataParams,
) -> Result<serde_json::Value, AgentError> {
    let path = params
        .path
        .as_deref()
        .map(PathBuf::from)
        .or_else(|| services.default_data_path.clone())
        .ok_or_else(|| AgentError::InvalidInput {
            message: "No CSV path given and CAMPAIGN_DATA_PATH is not set".to_string(),
        })?;

    let records = match load_records_from_path(&path) {
        Ok(records) => records,
        Err(CampaignError::DataQuality { report }) => {
            log::warn!(
                "{} data quality issue(s) in {}",
                report.issues.len(),
                path.display()
            );
            return Ok(json!({
                "status": "error",
                "message": format!(
                    "{} of {} rows failed validation",
                    report.rows_checked - report.valid_rows,
                    report.rows_checked
                ),
                "issues": report
                    .issues
                    .iter()
                    .take(MAX_REPORTED_ISSUES)
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
                "totalIssues": report.issues.len(),
            }));
        }
        Err(e) => return Err(e.into()),
    };

    let analysis = CampaignAnalysis {
        metadata: AnalysisMetadata {
            candidate_name: params.candidate_name,
            opponent_name: params.opponent_name,
            candidate_base: params.candidate_base,
            location: params.location,
            source: path.display().to_string(),
            columns: read_extra_columns_from_path(&path)?,
            ..AnalysisMetadata::default()
        },
        records,
    };
    let result = analysis_result(&analysis);
    session.set_analysis(analysis);
    Ok(result)
}

fn scored(points: Vec<HeatmapPoint>) -> Vec<ScoredPoint> {
    points
        .into_iter()
        .map(|p| ScoredPoint {
            latitude: p.latitude,
            longitude: p.longitude,
            geohash: p.geohash,
            affinity: p.affinity,
            popularity: p.popularity,
        })
        .collect()
}

/// Parses an age bracket label.
///
/// # Errors
///
/// Returns [`AgentError::InvalidInput`] listing the accepted values.
pub fn parse_age(value: Option<&str>) -> Result<Option<AgeGroup>, AgentError> {
    super::non_empty(value)
        .map(|age| {
            AgeGroup::from_str(&age).map_err(|_| AgentError::InvalidInput {
                message: format!(
                    "Invalid age '{age}'. Valid values: {}",
                    AgeGroup::all()
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
        })
        .transpose()
}

/// Parses a gender label.
///
/// # Errors
///
/// Returns [`AgentError::InvalidInput`] for anything but `male`/`female`.
pub fn parse_gender(value: Option<&str>) -> Result<Option<Gender>, AgentError> {
    super::non_empty(value)
        .map(|gender| {
            Gender::from_str(&gender).map_err(|_| AgentError::InvalidInput {
                message: format!("Invalid gender '{gender}'. Valid values: male, female"),
            })
        })
        .transpose()
}

/// Builds an analysis from Qloo heatmaps for the candidate, the opponent,
/// the party base and each issue tag, and saves it as a CSV artifact.
///
/// # Errors
///
/// Returns [`AgentError`] if parameters are invalid, a name cannot be
/// resolved, a Qloo request fails, or the heatmaps do not overlap.
pub async fn create_candidate_analysis(
    services: &Services,
    session: &mut CampaignSession,
    params: CandidateAnalysisParams,
) -> Result<serde_json::Value, AgentError> {
    let qloo = services.qloo()?;
    let age = parse_age(params.age.as_deref())?;
    let gender = parse_gender(params.gender.as_deref())?;
    let base_label = super::non_empty(params.candidate_base.as_deref())
        .unwrap_or_else(|| DEFAULT_CANDIDATE_BASE.to_string());
    let base = PoliticalBase::from_label(&base_label);

    let candidate = qloo
        .resolve_entity(&params.candidate_name)
        .await?
        .ok_or_else(|| AgentError::InvalidInput {
            message: format!("Could not find candidate '{}' in Qloo", params.candidate_name),
        })?;
    let opponent = qloo
        .resolve_entity(&params.opponent_name)
        .await?
        .ok_or_else(|| AgentError::InvalidInput {
            message: format!("Could not find opponent '{}' in Qloo", params.opponent_name),
        })?;

    let request = |entity_ids: Vec<String>, tag_ids: Vec<String>, audience_ids: Vec<String>| {
        HeatmapRequest {
            location_query: params.location.clone(),
            entity_ids,
            tag_ids,
            audience_ids,
            age,
            gender,
            boundary: None,
            limit: DEFAULT_HEATMAP_LIMIT,
        }
    };

    let mut inputs = HeatmapInputs {
        candidate: scored(
            qloo.heatmap(&request(vec![candidate.entity_id.clone()], Vec::new(), Vec::new()))
                .await?,
        ),
        opponent: scored(
            qloo.heatmap(&request(vec![opponent.entity_id.clone()], Vec::new(), Vec::new()))
                .await?,
        ),
        base: scored(
            qloo.heatmap(&request(
                Vec::new(),
                Vec::new(),
                vec![base.audience_urn().to_string()],
            ))
            .await?,
        ),
        ..HeatmapInputs::default()
    };

    let mut tag_names = Vec::new();
    for tag in &params.tags {
        let tag_ids = qloo.resolve_tag_ids(tag).await?;
        if tag_ids.is_empty() {
            continue;
        }
        let points = qloo
            .heatmap(&request(vec![candidate.entity_id.clone()], tag_ids, Vec::new()))
            .await?;
        inputs.tags.insert(tag_key(tag), scored(points));
        tag_names.push(tag.clone());
    }

    let records = build_records(&inputs)?;
    let columns = inputs
        .tags
        .keys()
        .flat_map(|key| [format!("{TAG_PREFIX}{key}"), issue_column(key)])
        .collect();

    let analysis = CampaignAnalysis {
        metadata: AnalysisMetadata {
            candidate_name: Some(params.candidate_name.clone()),
            opponent_name: Some(params.opponent_name.clone()),
            candidate_base: Some(base.to_string()),
            location: Some(params.location.clone()),
            age: age.map(|a| a.to_string()),
            gender: gender.map(|g| g.to_string()),
            tag_names,
            source: "qloo".to_string(),
            columns,
        },
        records,
    };

    let mut csv = Vec::new();
    write_records(&mut csv, &analysis.records)?;
    let artifact = services.artifacts.save(
        &format!(
            "candidate_analysis_{}_{}.csv",
            slug(&params.candidate_name),
            slug(&params.location)
        ),
        &csv,
    )?;

    let mut result = analysis_result(&analysis);
    result["candidate"] = json!(candidate.name);
    result["opponent"] = json!(opponent.name);
    result["artifact"] = serde_json::to_value(&artifact)?;

    session.set_analysis(analysis);
    Ok(result)
}

fn analysis_result(analysis: &CampaignAnalysis) -> serde_json::Value {
    let structure = data_structure(&analysis.records);
    json!({
        "status": "success",
        "totalLocations": analysis.records.len(),
        "metadata": analysis.metadata,
        "strategyCounts": structure.value_counts.get("strategy"),
        "issues": analysis.issue_names(),
    })
}

/// Describes the loaded analysis.
///
/// # Errors
///
/// Returns [`AgentError::MissingState`] if nothing is loaded.
pub fn check_analysis_data_structure(
    session: &CampaignSession,
) -> Result<serde_json::Value, AgentError> {
    let analysis = session.analysis()?;
    Ok(serde_json::to_value(data_structure(&analysis.records))?)
}

/// Filters the analysis by column criteria and saves the result as the
/// identified locations.
///
/// # Errors
///
/// Returns [`AgentError`] if nothing is loaded or a threshold is not a
/// number.
pub fn filter_campaign_locations(
    session: &mut CampaignSession,
    params: FilterLocationsParams,
) -> Result<serde_json::Value, AgentError> {
    let analysis = session.analysis()?;
    let CriteriaOutcome {
        records,
        applied,
        skipped,
    } = filter_by_criteria(
        &analysis.records,
        &analysis.metadata.columns,
        &params.criteria,
    )?;

    if records.is_empty() {
        return Ok(json!({
            "status": "warning",
            "message": "No locations matched the filter criteria",
            "filtersApplied": applied,
            "skippedCriteria": skipped,
            "availableColumns": data_structure(&analysis.records).columns,
        }));
    }

    let group = build_location_group(&params.tag, &records, applied)?;
    let result = json!({
        "status": "success",
        "tag": group.tag,
        "description": group.description,
        "totalLocations": group.total_locations,
        "filtersApplied": group.filters_applied,
        "skippedCriteria": skipped,
        "sampleCoordinates": sample_coordinates(&group),
    });

    log::info!("Identified {} locations as '{}'", group.total_locations, group.tag);
    session.set_identified_locations(group);
    Ok(result)
}

/// Applies the exact-match strategic filter and saves the result as the
/// identified locations.
///
/// # Errors
///
/// Returns [`AgentError::MissingState`] if nothing is loaded.
pub fn filter_strategic_locations(
    session: &mut CampaignSession,
    params: FilterStrategicParams,
) -> Result<serde_json::Value, AgentError> {
    let filter = StrategicFilter {
        strategy: params.strategy,
        popularity_status: params.popularity_status,
        base_popularity_status: params.base_popularity_status,
    };
    let analysis = session.analysis()?;
    let matched = filter_strategic(&analysis.records, &filter);

    if matched.is_empty() {
        return Ok(json!({
            "status": "warning",
            "message": format!("No locations match {}", filter.describe()),
        }));
    }

    let tag = super::non_empty(params.tag.as_deref()).unwrap_or_else(|| {
        format!(
            "{} / {} / {}",
            filter.strategy, filter.popularity_status, filter.base_popularity_status
        )
    });
    let group = build_location_group(&tag, &matched, vec![filter.describe()])?;
    let result = json!({
        "status": "success",
        "tag": group.tag,
        "totalLocations": group.total_locations,
        "filtersApplied": group.filters_applied,
        "sampleCoordinates": sample_coordinates(&group),
    });

    session.set_identified_locations(group);
    Ok(result)
}

/// Returns the current location group.
#[must_use]
pub fn get_identified_locations(session: &CampaignSession) -> serde_json::Value {
    session.identified_locations.as_ref().map_or_else(
        || {
            json!({
                "status": "warning",
                "message": "No locations identified yet. Filter campaign locations first.",
            })
        },
        |group| {
            json!({
                "status": "success",
                "tag": group.tag,
                "description": group.description,
                "totalLocations": group.total_locations,
                "filtersApplied": group.filters_applied,
                "createdAt": group.created_at,
                "sampleCoordinates": sample_coordinates(group),
            })
        },
    )
}

/// Lists recent location groups.
#[must_use]
pub fn list_location_history(session: &CampaignSession) -> serde_json::Value {
    json!({
        "status": "success",
        "current": session.identified_locations.as_ref().map(|g| &g.tag),
        "history": session.location_history,
    })
}

/// Breaks down the Rally the Base locations.
///
/// # Errors
///
/// Returns [`AgentError::MissingState`] if nothing is loaded or there are
/// no Rally the Base locations.
pub fn identify_rally_segments(session: &CampaignSession) -> Result<serde_json::Value, AgentError> {
    let analysis = session.analysis()?;
    let targeting =
        rally_base_targeting(&analysis.records).ok_or_else(|| AgentError::MissingState {
            message: "The analysis has no Rally the Base locations".to_string(),
        })?;
    Ok(serde_json::to_value(targeting)?)
}

/// Summarizes the Hidden Goldmine locations.
///
/// # Errors
///
/// Returns [`AgentError::MissingState`] if nothing is loaded.
pub fn identify_hidden_goldmine_segments(
    session: &CampaignSession,
) -> Result<serde_json::Value, AgentError> {
    let analysis = session.analysis()?;
    Ok(serde_json::to_value(hidden_goldmine_targeting(&analysis.records))?)
}

/// Writes the Markdown strategy report as an artifact.
///
/// # Errors
///
/// Returns [`AgentError`] if nothing is loaded or the artifact cannot be
/// written.
pub fn generate_campaign_report(
    services: &Services,
    session: &CampaignSession,
) -> Result<serde_json::Value, AgentError> {
    let analysis = session.analysis()?;
    let report = campaign_report(analysis, Utc::now());
    let artifact = services
        .artifacts
        .save(&report_filename(analysis), report.as_bytes())?;

    Ok(json!({
        "status": "success",
        "artifact": artifact,
        "url": format!("/artifacts/{}", artifact.filename),
        "totalLocations": analysis.records.len(),
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use resonance_campaign_models::{
        BasePopularityStatus, CriterionValue, PopularityStatus, Strategy,
    };

    use super::*;
    use crate::tools::test_support::*;

    #[test]
    fn criteria_filter_saves_identified_locations() {
        let mut session = session_with_analysis();
        let mut criteria = BTreeMap::new();
        criteria.insert(
            "strategy".to_string(),
            CriterionValue::Many(vec!["Rally the Base".to_string()]),
        );
        criteria.insert(
            "popularity_status".to_string(),
            CriterionValue::One("Trailing Opponent".to_string()),
        );

        let result = filter_campaign_locations(
            &mut session,
            FilterLocationsParams {
                tag: "Swing Voters".to_string(),
                criteria,
            },
        )
        .unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["totalLocations"], 2);
        assert_eq!(result["sampleCoordinates"].as_array().unwrap().len(), 2);
        let group = session.identified_locations.as_ref().unwrap();
        assert_eq!(group.tag, "Swing Voters");
        assert_eq!(session.location_history.len(), 1);
    }

    #[test]
    fn empty_filter_result_is_a_warning() {
        let mut session = session_with_analysis();
        let mut criteria = BTreeMap::new();
        criteria.insert("min_affinity".to_string(), CriterionValue::Number(0.99));

        let result = filter_campaign_locations(
            &mut session,
            FilterLocationsParams {
                tag: "Nobody".to_string(),
                criteria,
            },
        )
        .unwrap();

        assert_eq!(result["status"], "warning");
        assert!(result["availableColumns"].as_array().unwrap().len() >= 8);
        assert!(session.identified_locations.is_none());
    }

    #[test]
    fn strategic_filter_matches_all_three_fields() {
        let mut session = session_with_analysis();
        let result = filter_strategic_locations(
            &mut session,
            FilterStrategicParams {
                strategy: Strategy::RallyTheBase,
                popularity_status: PopularityStatus::TrailingOpponent,
                base_popularity_status: BasePopularityStatus::LessPopularThanParty,
                tag: None,
            },
        )
        .unwrap();

        assert_eq!(result["totalLocations"], 2);
        assert_eq!(
            result["tag"],
            "Rally the Base / Trailing Opponent / Less Popular than Party"
        );
        assert_eq!(get_identified_locations(&session)["totalLocations"], 2);
    }

    #[test]
    fn tools_need_an_analysis() {
        let session = CampaignSession::new(uuid::Uuid::new_v4());
        assert!(matches!(
            identify_rally_segments(&session),
            Err(AgentError::MissingState { .. })
        ));
        assert_eq!(get_identified_locations(&session)["status"], "warning");
    }

    #[test]
    fn rally_and_goldmine_segments() {
        let session = session_with_analysis();
        let rally = identify_rally_segments(&session).unwrap();
        assert_eq!(rally["totalRallyLocations"], 3);

        let goldmine = identify_hidden_goldmine_segments(&session).unwrap();
        assert_eq!(goldmine["totalGoldmineLocations"], 1);
    }

    #[test]
    fn goldmine_segments_without_goldmine_rows() {
        let mut analysis = analysis();
        analysis.records.retain(|r| r.strategy != Strategy::HiddenGoldmine);
        let lpp = analysis
            .records
            .iter()
            .filter(|r| r.base_popularity_status == BasePopularityStatus::LessPopularThanParty)
            .count();
        let mut session = CampaignSession::new(uuid::Uuid::new_v4());
        session.set_analysis(analysis);

        let goldmine = identify_hidden_goldmine_segments(&session).unwrap();
        assert_eq!(goldmine["totalGoldmineLocations"], 0);
        assert_eq!(goldmine["lessPopularThanParty"], lpp);
        assert!(lpp > 0);
    }

    #[test]
    fn report_is_saved_as_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        let session = session_with_analysis();

        let result = generate_campaign_report(&services, &session).unwrap();
        let filename = result["artifact"]["filename"].as_str().unwrap();
        assert_eq!(filename, "campaign_report_jane_doe_new_york__ny_v1.md");

        let saved = String::from_utf8(services.artifacts.load(filename).unwrap()).unwrap();
        assert!(saved.starts_with("# Campaign Strategy Report: Jane Doe vs John Roe"));
    }

    #[test]
    fn load_reports_data_quality_issues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "latitude,longitude,affinity,popularity,strategy,segment,popularity_status,base_popularity_status\n\
             40.7,-74.0,1.7,0.5,Rally the Base,HA-HP,Trailing Opponent,Less Popular than Party\n",
        )
        .unwrap();
        let services = services(dir.path());
        let mut session = CampaignSession::new(uuid::Uuid::new_v4());

        let result = load_campaign_data(
            &services,
            &mut session,
            LoadCampaignDataParams {
                path: Some(path.display().to_string()),
                ..LoadCampaignDataParams::default()
            },
        )
        .unwrap();

        assert_eq!(result["status"], "error");
        assert_eq!(result["totalIssues"], 1);
        assert!(session.analysis.is_none());
    }

    #[test]
    fn load_uses_the_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campaign.csv");
        std::fs::write(&path, CSV).unwrap();
        let mut services = services(dir.path());
        services.default_data_path = Some(path);
        let mut session = CampaignSession::new(uuid::Uuid::new_v4());

        let result =
            load_campaign_data(&services, &mut session, LoadCampaignDataParams::default()).unwrap();
        assert_eq!(result["totalLocations"], 6);
        assert_eq!(result["issues"], json!(["economy"]));
        assert_eq!(session.analysis().unwrap().records.len(), 6);
    }

    #[test]
    fn blank_tag_column_from_csv_filters_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campaign.csv");
        std::fs::write(
            &path,
            "latitude,longitude,affinity,popularity,strategy,segment,popularity_status,base_popularity_status,tag_politics\n\
             40.7,-74.0,0.8,0.7,Rally the Base,HA-HP,Trailing Opponent,Less Popular than Party,\n\
             40.8,-74.1,0.7,0.3,Hidden Goldmine,HA-LP,Similar Popularity,Less Popular than Party,\n",
        )
        .unwrap();
        let services = services(dir.path());
        let mut session = CampaignSession::new(uuid::Uuid::new_v4());
        load_campaign_data(
            &services,
            &mut session,
            LoadCampaignDataParams {
                path: Some(path.display().to_string()),
                ..LoadCampaignDataParams::default()
            },
        )
        .unwrap();
        assert_eq!(
            session.analysis().unwrap().metadata.columns,
            vec!["tag_politics".to_string()]
        );

        let mut criteria = BTreeMap::new();
        criteria.insert(
            "tag_politics".to_string(),
            CriterionValue::One("high".to_string()),
        );
        let result = filter_campaign_locations(
            &mut session,
            FilterLocationsParams {
                tag: "politics".to_string(),
                criteria,
            },
        )
        .unwrap();

        assert_eq!(result["status"], "warning");
        assert_eq!(result["skippedCriteria"], json!([]));
    }

    #[test]
    fn demographics_are_validated() {
        assert_eq!(parse_age(Some("25_to_29")).unwrap(), Some(AgeGroup::From25To29));
        assert_eq!(parse_age(None).unwrap(), None);
        assert!(parse_age(Some("teens")).is_err());
        assert_eq!(parse_gender(Some("Female")).unwrap(), Some(Gender::Female));
        assert!(parse_gender(Some("other")).is_err());
    }
}
