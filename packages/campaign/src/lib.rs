#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Campaign data ingestion, strategic filtering, and targeting analysis.
//!
//! Everything in this crate works on in-memory
//! [`CampaignLocationRecord`](resonance_campaign_models::CampaignLocationRecord)
//! slices and never mutates them. Records enter through [`ingest`] (CSV)
//! or [`classify`] (merged heatmap points), are narrowed by [`filter`],
//! and are summarised by [`targeting`], [`summary`], and [`report`].

pub mod classify;
pub mod filter;
pub mod ingest;
pub mod report;
pub mod summary;
pub mod targeting;

use resonance_campaign_models::DataQualityReport;
use thiserror::Error;

/// Errors that can occur while loading or analysing campaign data.
#[derive(Debug, Error)]
pub enum CampaignError {
    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the CSV header.
    #[error("Missing required column: {column}")]
    MissingColumn {
        /// Column name.
        column: String,
    },

    /// One or more rows failed validation.
    #[error(
        "Data quality check failed: {} issue(s) in {} row(s)",
        .report.issues.len(),
        .report.rows_checked
    )]
    DataQuality {
        /// Every issue found.
        report: DataQualityReport,
    },

    /// The merged analysis had no rows.
    #[error("No overlapping data: {message}")]
    NoOverlap {
        /// What was missing.
        message: String,
    },

    /// The caller supplied unusable input.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description.
        message: String,
    },
}

/// Rounds to `places` decimal places for display in tool results.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Percentage of `part` in `whole`, rounded to one decimal place.
///
/// Returns `0.0` when `whole` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

/// Arithmetic mean, or `None` for an empty iterator.
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
