#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the Qloo cultural-intelligence API.
//!
//! Resolves names to entity and tag IDs, fetches location heatmaps, and
//! queries cultural insights for a polygon.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `QLOO_API_KEY` | Yes | API key sent as `X-Api-Key` |
//! | `QLOO_BASE_URL` | No | Defaults to [`DEFAULT_BASE_URL`] |

pub mod parse;
pub mod polygon;
pub mod retry;

use std::time::Duration;

use resonance_qloo_models::{
    HeatmapPoint, HeatmapRequest, InsightCategory, InsightItem, InsightSignals, QlooTag,
    SearchEntity,
};

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://hackathon.api.qloo.com";

/// Default number of heatmap points.
pub const DEFAULT_HEATMAP_LIMIT: u32 = 50;

/// Candidates considered when resolving an entity name.
const ENTITY_SEARCH_LIMIT: u32 = 2;

/// Tags considered when resolving a tag name.
const TAG_SEARCH_LIMIT: u32 = 5;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur when calling Qloo.
#[derive(Debug, thiserror::Error)]
pub enum QlooError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Qloo returned an error status.
    #[error("Qloo API error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body preview.
        message: String,
    },

    /// Missing configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// The caller supplied unusable input.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description.
        message: String,
    },
}

/// Qloo API client.
#[derive(Debug, Clone)]
pub struct QlooClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl QlooClient {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`QlooError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, QlooError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Creates a client from `QLOO_API_KEY` and `QLOO_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`QlooError::Config`] if `QLOO_API_KEY` is unset.
    pub fn from_env() -> Result<Self, QlooError> {
        let api_key = std::env::var("QLOO_API_KEY").map_err(|_| QlooError::Config {
            message: "QLOO_API_KEY environment variable not set".to_string(),
        })?;
        let base_url =
            std::env::var("QLOO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(api_key, base_url)
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<serde_json::Value, QlooError> {
        let url = format!("{}{path}", self.base_url);
        log::debug!("GET {url} {query:?}");
        retry::send_json(|| {
            self.client
                .get(&url)
                .header("X-Api-Key", &self.api_key)
                .header("Accept", "application/json")
                .query(query)
        })
        .await
    }

    /// Searches entities by name, best match first.
    ///
    /// # Errors
    ///
    /// Returns [`QlooError`] if the request fails.
    pub async fn search_entities(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<SearchEntity>, QlooError> {
        let body = self
            .get_json(
                "/search",
                &[
                    ("query".to_string(), query.to_string()),
                    ("limit".to_string(), limit.to_string()),
                    ("sort_by".to_string(), "match".to_string()),
                ],
            )
            .await?;
        Ok(parse::parse_search_entities(&body))
    }

    /// Searches tags by name.
    ///
    /// # Errors
    ///
    /// Returns [`QlooError`] if the request fails.
    pub async fn search_tags(&self, query: &str, limit: u32) -> Result<Vec<QlooTag>, QlooError> {
        let body = self
            .get_json(
                "/v2/tags",
                &[
                    ("filter.query".to_string(), query.to_string()),
                    ("take".to_string(), limit.to_string()),
                ],
            )
            .await?;
        Ok(parse::parse_tags(&body))
    }

    /// Resolves a name to its best-matching entity.
    ///
    /// # Errors
    ///
    /// Returns [`QlooError`] if the request fails.
    pub async fn resolve_entity(&self, name: &str) -> Result<Option<SearchEntity>, QlooError> {
        let entity = self
            .search_entities(name, ENTITY_SEARCH_LIMIT)
            .await?
            .into_iter()
            .next();
        match &entity {
            Some(e) => log::info!("Resolved entity '{name}' -> {} ({})", e.name, e.entity_id),
            None => log::warn!("Could not resolve entity '{name}'"),
        }
        Ok(entity)
    }

    /// Resolves a name to every matching tag ID.
    ///
    /// # Errors
    ///
    /// Returns [`QlooError`] if the request fails.
    pub async fn resolve_tag_ids(&self, name: &str) -> Result<Vec<String>, QlooError> {
        let tags = self.search_tags(name, TAG_SEARCH_LIMIT).await?;
        if tags.is_empty() {
            log::warn!("Could not resolve tag '{name}'");
        } else {
            log::info!(
                "Resolved tag '{name}' -> {}",
                tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
        Ok(tags.into_iter().map(|t| t.id).collect())
    }

    /// Fetches a location heatmap.
    ///
    /// # Errors
    ///
    /// Returns [`QlooError`] if the request fails.
    pub async fn heatmap(&self, request: &HeatmapRequest) -> Result<Vec<HeatmapPoint>, QlooError> {
        let body = self
            .get_json("/v2/insights", &heatmap_query(request))
            .await?;
        let points = parse::parse_heatmap(&body);
        log::info!(
            "Retrieved {} heatmap points for {}",
            points.len(),
            request.location_query
        );
        Ok(points)
    }

    /// Fetches ranked insights of one category for a polygon.
    ///
    /// # Errors
    ///
    /// Returns [`QlooError`] if the request fails.
    pub async fn insights(
        &self,
        category: InsightCategory,
        signals: &InsightSignals,
        limit: u32,
    ) -> Result<Vec<InsightItem>, QlooError> {
        let body = self
            .get_json("/v2/insights", &insights_query(category, signals, limit))
            .await?;
        Ok(parse::parse_insights(&body, category))
    }
}

/// Query parameters for a heatmap request. Empty lists and unset
/// demographics are omitted.
#[must_use]
pub fn heatmap_query(request: &HeatmapRequest) -> Vec<(String, String)> {
    let mut query = vec![
        ("filter.type".to_string(), "urn:heatmap".to_string()),
        (
            "filter.location.query".to_string(),
            request.location_query.clone(),
        ),
    ];
    push_list(&mut query, "signal.interests.entities", &request.entity_ids);
    push_list(&mut query, "signal.interests.tags", &request.tag_ids);
    push_list(&mut query, "signal.demographics.audiences", &request.audience_ids);
    if let Some(age) = request.age {
        query.push(("signal.demographics.age".to_string(), age.to_string()));
    }
    if let Some(gender) = request.gender {
        query.push(("signal.demographics.gender".to_string(), gender.to_string()));
    }
    if let Some(boundary) = &request.boundary {
        query.push(("output.heatmap.boundary".to_string(), boundary.clone()));
    }
    query.push(("take".to_string(), request.limit.to_string()));
    query
}

/// Query parameters for an insights request.
#[must_use]
pub fn insights_query(
    category: InsightCategory,
    signals: &InsightSignals,
    limit: u32,
) -> Vec<(String, String)> {
    let mut query = vec![
        ("filter.type".to_string(), category.filter_type().to_string()),
        ("signal.location".to_string(), signals.location_wkt.clone()),
    ];
    if let Some(age) = signals.age {
        query.push(("signal.demographics.age".to_string(), age.to_string()));
    }
    if let Some(gender) = signals.gender {
        query.push(("signal.demographics.gender".to_string(), gender.to_string()));
    }
    query.push(("take".to_string(), limit.to_string()));
    query
}

fn push_list(query: &mut Vec<(String, String)>, key: &str, values: &[String]) {
    if !values.is_empty() {
        query.push((key.to_string(), values.join(",")));
    }
}

#[cfg(test)]
mod tests {
    use resonance_qloo_models::{AgeGroup, Gender, InsightsAge, PoliticalBase};

    use super::*;

    fn value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
        query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn heatmap_query_omits_empty_signals() {
        let request = HeatmapRequest {
            location_query: "New York, NY".to_string(),
            entity_ids: vec!["E1".to_string(), "E2".to_string()],
            limit: DEFAULT_HEATMAP_LIMIT,
            ..HeatmapRequest::default()
        };
        let query = heatmap_query(&request);
        assert_eq!(value(&query, "filter.type"), Some("urn:heatmap"));
        assert_eq!(value(&query, "signal.interests.entities"), Some("E1,E2"));
        assert_eq!(value(&query, "signal.interests.tags"), None);
        assert_eq!(value(&query, "signal.demographics.age"), None);
        assert_eq!(value(&query, "take"), Some("50"));
    }

    #[test]
    fn heatmap_query_carries_demographics_and_audiences() {
        let request = HeatmapRequest {
            location_query: "Austin, TX".to_string(),
            audience_ids: vec![PoliticalBase::Progressive.audience_urn().to_string()],
            age: Some(AgeGroup::From35To44),
            gender: Some(Gender::Female),
            boundary: Some("geohashes".to_string()),
            limit: 10,
            ..HeatmapRequest::default()
        };
        let query = heatmap_query(&request);
        assert_eq!(
            value(&query, "signal.demographics.audiences"),
            Some("urn:audience:political_preferences:politically_progressive")
        );
        assert_eq!(value(&query, "signal.demographics.age"), Some("35_to_44"));
        assert_eq!(value(&query, "signal.demographics.gender"), Some("female"));
        assert_eq!(value(&query, "output.heatmap.boundary"), Some("geohashes"));
    }

    #[test]
    fn insights_query_uses_polygon_signal() {
        let signals = InsightSignals {
            location_wkt: "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))".to_string(),
            age: Some(InsightsAge::From36To55),
            gender: None,
        };
        let query = insights_query(InsightCategory::Artists, &signals, 5);
        assert_eq!(value(&query, "filter.type"), Some("urn:entity:artist"));
        assert_eq!(
            value(&query, "signal.location"),
            Some("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))")
        );
        assert_eq!(value(&query, "signal.demographics.age"), Some("36_to_55"));
        assert_eq!(value(&query, "take"), Some("5"));
    }

    #[test]
    fn base_url_is_normalised() {
        let client = QlooClient::new("key", "https://example.test/").unwrap();
        assert_eq!(client.base_url, "https://example.test");
    }
}
