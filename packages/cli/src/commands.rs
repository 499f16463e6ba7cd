//! Offline commands over a campaign CSV.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use resonance_agents::artifacts::ArtifactStore;
use resonance_campaign::filter::filter_strategic;
use resonance_campaign::ingest::{load_records_from_path, validate_records, write_records_to_path};
use resonance_campaign::report::{campaign_report, report_filename};
use resonance_campaign::summary::data_structure;
use resonance_campaign::targeting::{hidden_goldmine_targeting, rally_base_targeting};
use resonance_campaign_models::{
    AnalysisMetadata, BasePopularityStatus, CampaignAnalysis, PopularityStatus, StrategicFilter,
    Strategy,
};

use crate::Analysis;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

fn parse_label<T: FromStr>(name: &str, value: &str) -> Result<T, String> {
    T::from_str(value.trim()).map_err(|_| format!("Invalid {name}: '{value}'"))
}

/// Prints the data-quality report. Fails if any row is invalid.
pub fn validate(path: &Path, max_issues: usize) -> CommandResult {
    let file = std::fs::File::open(path)?;
    let (_, report) = validate_records(file)?;

    println!(
        "{} rows checked, {} valid",
        report.rows_checked, report.valid_rows
    );

    if report.is_clean() {
        println!("No data-quality issues.");
        return Ok(());
    }

    println!();
    println!("{:<6} {:<32} {:<20} REASON", "ROW", "COLUMN", "VALUE");
    println!("{}", "-".repeat(90));
    for issue in report.issues.iter().take(max_issues) {
        println!(
            "{:<6} {:<32} {:<20} {}",
            issue.row, issue.column, issue.value, issue.reason
        );
    }
    if report.issues.len() > max_issues {
        println!("... and {} more", report.issues.len() - max_issues);
    }

    Err(format!("{} data-quality issue(s)", report.issues.len()).into())
}

/// Applies the strategic filter and prints or writes the matches.
pub fn filter(
    path: &Path,
    strategy: &str,
    popularity_status: &str,
    base_popularity_status: &str,
    output: Option<&Path>,
) -> CommandResult {
    let filter = StrategicFilter {
        strategy: parse_label::<Strategy>("strategy", strategy)?,
        popularity_status: parse_label::<PopularityStatus>("popularity status", popularity_status)?,
        base_popularity_status: parse_label::<BasePopularityStatus>(
            "base popularity status",
            base_popularity_status,
        )?,
    };

    let records = load_records_from_path(path)?;
    let matched = filter_strategic(&records, &filter);

    println!("{}", filter.describe());
    println!("{} of {} locations match", matched.len(), records.len());

    if let Some(output) = output {
        let rows: Vec<_> = matched.into_iter().cloned().collect();
        write_records_to_path(output, &rows)?;
        println!("Wrote {}", output.display());
        return Ok(());
    }

    println!();
    println!(
        "{:<12} {:<12} {:<9} {:<10} SEGMENT",
        "LATITUDE", "LONGITUDE", "AFFINITY", "POPULARITY"
    );
    for r in matched {
        println!(
            "{:<12.5} {:<12.5} {:<9.3} {:<10.3} {}",
            r.latitude, r.longitude, r.affinity, r.popularity, r.segment
        );
    }
    Ok(())
}

/// Prints one of the targeting analyses as JSON.
pub fn analyze(path: &Path, kind: Analysis) -> CommandResult {
    let records = load_records_from_path(path)?;

    let value = match kind {
        Analysis::Rally => serde_json::to_value(
            rally_base_targeting(&records).ok_or("No Rally the Base locations in this file")?,
        )?,
        Analysis::Goldmine => serde_json::to_value(hidden_goldmine_targeting(&records))?,
        Analysis::Summary => serde_json::to_value(data_structure(&records))?,
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Writes the Markdown campaign report to the artifact store.
pub fn report(
    path: &Path,
    candidate: Option<String>,
    opponent: Option<String>,
    location: Option<String>,
    output_dir: Option<PathBuf>,
) -> CommandResult {
    let records = load_records_from_path(path)?;
    let analysis = CampaignAnalysis {
        metadata: AnalysisMetadata {
            candidate_name: candidate,
            opponent_name: opponent,
            location,
            source: path.display().to_string(),
            ..AnalysisMetadata::default()
        },
        records,
    };

    let store = output_dir.map_or_else(ArtifactStore::from_env, ArtifactStore::new);
    let report = campaign_report(&analysis, Utc::now());
    let artifact = store.save(&report_filename(&analysis), report.as_bytes())?;

    println!(
        "Wrote {}",
        store.root().join(&artifact.filename).display()
    );
    Ok(())
}
