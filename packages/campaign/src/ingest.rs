//! Campaign CSV ingestion and export.
//!
//! Every row is checked and every problem is collected into a
//! [`DataQualityReport`]. Rows are never silently dropped: callers either
//! get all rows or an error listing what is wrong with the others.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use resonance_campaign_models::{
    BasePopularityStatus, CampaignLocationRecord, DataQualityIssue, DataQualityReport,
    IssuePopularityStatus, OPTIONAL_COLUMNS, PopularityStatus, REQUIRED_COLUMNS, Strategy,
    TAG_PREFIX, issue_column, issue_name_from_column,
};

use crate::CampaignError;

/// Loads and validates campaign records from a CSV file.
///
/// # Errors
///
/// Returns [`CampaignError::DataQuality`] if any row fails validation,
/// [`CampaignError::MissingColumn`] if the header lacks a required column,
/// or an I/O / CSV error if the file cannot be read.
pub fn load_records_from_path(path: &Path) -> Result<Vec<CampaignLocationRecord>, CampaignError> {
    log::info!("Loading campaign data from {}", path.display());
    let file = std::fs::File::open(path)?;
    load_records(file)
}

/// Loads and validates campaign records from any CSV reader.
///
/// # Errors
///
/// Same as [`load_records_from_path`].
pub fn load_records<R: Read>(reader: R) -> Result<Vec<CampaignLocationRecord>, CampaignError> {
    let (records, report) = validate_records(reader)?;
    if !report.is_clean() {
        for issue in report.issues.iter().take(20) {
            log::warn!("Data quality: {issue}");
        }
        return Err(CampaignError::DataQuality { report });
    }
    log::info!("Loaded {} campaign records", records.len());
    Ok(records)
}

/// Reads the tag and issue column names from a campaign CSV header.
///
/// Blank cells are not stored on records, so a column whose cells are all
/// blank is only visible here.
///
/// # Errors
///
/// Returns an I/O or CSV error if the header cannot be read.
pub fn read_extra_columns_from_path(path: &Path) -> Result<Vec<String>, CampaignError> {
    let file = std::fs::File::open(path)?;
    read_extra_columns(file)
}

/// Same as [`read_extra_columns_from_path`] for any CSV reader.
///
/// # Errors
///
/// Returns a CSV error if the header cannot be read.
pub fn read_extra_columns<R: Read>(reader: R) -> Result<Vec<String>, CampaignError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    Ok(reader
        .headers()?
        .iter()
        .map(str::trim)
        .filter(|h| {
            h.strip_prefix(TAG_PREFIX).is_some_and(|name| !name.is_empty())
                || issue_name_from_column(h).is_some()
        })
        .map(ToOwned::to_owned)
        .collect())
}

/// Checks every row of a campaign CSV and returns the valid records
/// together with the full data-quality report.
///
/// Structural problems (unreadable CSV, missing required columns) are
/// errors; per-row problems are collected in the report.
///
/// # Errors
///
/// Returns [`CampaignError::MissingColumn`] or a CSV error.
pub fn validate_records<R: Read>(
    reader: R,
) -> Result<(Vec<CampaignLocationRecord>, DataQualityReport), CampaignError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();
    let columns = ColumnIndex::new(&headers)?;

    let mut records = Vec::new();
    let mut report = DataQualityReport::default();

    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let raw = result?;
        report.rows_checked += 1;

        let mut row_check = RowCheck {
            row,
            raw: &raw,
            issues: Vec::new(),
        };
        let record = row_check.parse(&columns);

        if row_check.issues.is_empty()
            && let Some(record) = record
        {
            report.valid_rows += 1;
            records.push(record);
        } else {
            report.issues.append(&mut row_check.issues);
        }
    }

    Ok((records, report))
}

/// Writes records as CSV with the standard columns, plus any optional,
/// tag, and issue columns present in at least one record.
///
/// # Errors
///
/// Returns a CSV or I/O error if writing fails.
pub fn write_records<W: Write>(
    writer: W,
    records: &[CampaignLocationRecord],
) -> Result<(), CampaignError> {
    let has_geohash = records.iter().any(|r| r.geohash.is_some());
    let has_opponent = records.iter().any(|r| r.opponent_popularity.is_some());
    let has_base = records.iter().any(|r| r.base_popularity.is_some());

    let mut tag_names: Vec<&String> = records.iter().flat_map(|r| r.tags.keys()).collect();
    tag_names.sort();
    tag_names.dedup();
    let mut issue_names: Vec<&String> = records
        .iter()
        .flat_map(|r| r.issue_statuses.keys())
        .collect();
    issue_names.sort();
    issue_names.dedup();

    let mut header: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| (*c).to_string()).collect();
    if has_geohash {
        header.push("geohash".to_string());
    }
    if has_opponent {
        header.push("opponent_popularity".to_string());
    }
    if has_base {
        header.push("base_popularity".to_string());
    }
    header.extend(tag_names.iter().map(|t| format!("{TAG_PREFIX}{t}")));
    header.extend(issue_names.iter().map(|i| issue_column(i)));

    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&header)?;

    for r in records {
        let mut row = vec![
            r.latitude.to_string(),
            r.longitude.to_string(),
            r.affinity.to_string(),
            r.popularity.to_string(),
            r.strategy.to_string(),
            r.segment.clone(),
            r.popularity_status.to_string(),
            r.base_popularity_status.to_string(),
        ];
        if has_geohash {
            row.push(r.geohash.clone().unwrap_or_default());
        }
        if has_opponent {
            row.push(optional_float(r.opponent_popularity));
        }
        if has_base {
            row.push(optional_float(r.base_popularity));
        }
        for tag in &tag_names {
            row.push(r.tags.get(*tag).cloned().unwrap_or_default());
        }
        for issue in &issue_names {
            row.push(
                r.issue_statuses
                    .get(*issue)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            );
        }
        out.write_record(&row)?;
    }

    out.flush()?;
    Ok(())
}

/// Writes records to a CSV file, creating parent directories as needed.
///
/// # Errors
///
/// Returns an I/O or CSV error if the file cannot be written.
pub fn write_records_to_path(
    path: &Path,
    records: &[CampaignLocationRecord],
) -> Result<(), CampaignError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_records(file, records)?;
    log::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

fn optional_float(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Header positions of every recognised column.
struct ColumnIndex {
    required: BTreeMap<&'static str, usize>,
    optional: BTreeMap<&'static str, usize>,
    tags: Vec<(String, usize)>,
    issues: Vec<(String, usize)>,
}

impl ColumnIndex {
    fn new(headers: &[String]) -> Result<Self, CampaignError> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let mut required = BTreeMap::new();
        for column in REQUIRED_COLUMNS {
            let idx = position(column).ok_or_else(|| CampaignError::MissingColumn {
                column: (*column).to_string(),
            })?;
            required.insert(*column, idx);
        }

        let optional = OPTIONAL_COLUMNS
            .iter()
            .filter_map(|column| position(column).map(|idx| (*column, idx)))
            .collect();

        let tags = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| {
                h.strip_prefix(TAG_PREFIX)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_string(), idx))
            })
            .collect();

        let issues = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| issue_name_from_column(h).map(|name| (name.to_string(), idx)))
            .collect();

        Ok(Self {
            required,
            optional,
            tags,
            issues,
        })
    }
}

/// Per-row validation state.
struct RowCheck<'a> {
    row: usize,
    raw: &'a csv::StringRecord,
    issues: Vec<DataQualityIssue>,
}

impl RowCheck<'_> {
    fn field(&self, idx: usize) -> &str {
        self.raw.get(idx).unwrap_or("").trim()
    }

    fn flag(&mut self, column: &str, value: &str, reason: impl Into<String>) {
        self.issues.push(DataQualityIssue {
            row: self.row,
            column: column.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        });
    }

    fn required(&self, columns: &ColumnIndex, column: &'static str) -> String {
        columns
            .required
            .get(column)
            .map(|idx| self.field(*idx).to_string())
            .unwrap_or_default()
    }

    fn float_in(&mut self, column: &str, value: &str, min: f64, max: f64) -> Option<f64> {
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() && (min..=max).contains(&v) => Some(v),
            Ok(_) => {
                self.flag(column, value, format!("must be within [{min}, {max}]"));
                None
            }
            Err(_) => {
                self.flag(column, value, "not a number");
                None
            }
        }
    }

    fn member<T: FromStr>(&mut self, column: &str, value: &str) -> Option<T> {
        if let Ok(v) = T::from_str(value) {
            Some(v)
        } else {
            self.flag(column, value, "unrecognized value");
            None
        }
    }

    fn optional_score(&mut self, columns: &ColumnIndex, column: &'static str) -> Option<f64> {
        let idx = *columns.optional.get(column)?;
        let value = self.field(idx).to_string();
        if value.is_empty() {
            return None;
        }
        self.float_in(column, &value, 0.0, 1.0)
    }

    fn parse(&mut self, columns: &ColumnIndex) -> Option<CampaignLocationRecord> {
        let lat_raw = self.required(columns, "latitude");
        let lon_raw = self.required(columns, "longitude");
        let affinity_raw = self.required(columns, "affinity");
        let popularity_raw = self.required(columns, "popularity");
        let strategy_raw = self.required(columns, "strategy");
        let segment = self.required(columns, "segment");
        let status_raw = self.required(columns, "popularity_status");
        let base_raw = self.required(columns, "base_popularity_status");

        let latitude = self.float_in("latitude", &lat_raw, -90.0, 90.0);
        let longitude = self.float_in("longitude", &lon_raw, -180.0, 180.0);
        let affinity = self.float_in("affinity", &affinity_raw, 0.0, 1.0);
        let popularity = self.float_in("popularity", &popularity_raw, 0.0, 1.0);
        let strategy = self.member::<Strategy>("strategy", &strategy_raw);
        let popularity_status = self.member::<PopularityStatus>("popularity_status", &status_raw);
        let base_popularity_status =
            self.member::<BasePopularityStatus>("base_popularity_status", &base_raw);

        let geohash = columns
            .optional
            .get("geohash")
            .map(|idx| self.field(*idx).to_string())
            .filter(|v| !v.is_empty());
        let opponent_popularity = self.optional_score(columns, "opponent_popularity");
        let base_popularity = self.optional_score(columns, "base_popularity");

        let tags: BTreeMap<String, String> = columns
            .tags
            .iter()
            .filter_map(|(name, idx)| {
                let value = self.field(*idx);
                (!value.is_empty()).then(|| (name.clone(), value.to_string()))
            })
            .collect();

        let mut issue_statuses = BTreeMap::new();
        for (name, idx) in &columns.issues {
            let value = self.field(*idx).to_string();
            if value.is_empty() {
                continue;
            }
            if let Some(status) = self.member::<IssuePopularityStatus>(&issue_column(name), &value)
            {
                issue_statuses.insert(name.clone(), status);
            }
        }

        Some(CampaignLocationRecord {
            latitude: latitude?,
            longitude: longitude?,
            affinity: affinity?,
            popularity: popularity?,
            strategy: strategy?,
            segment,
            popularity_status: popularity_status?,
            base_popularity_status: base_popularity_status?,
            tags,
            issue_statuses,
            geohash,
            opponent_popularity,
            base_popularity,
        })
    }
}
