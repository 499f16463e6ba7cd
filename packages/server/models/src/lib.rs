#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the resonance server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the campaign and agent types so the API contract can evolve on its
//! own.

use resonance_agents_models::AgentDefinition;
use resonance_campaign_models::{
    BasePopularityStatus, CampaignLocationRecord, PopularityStatus, Strategy,
};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// An agent as listed by the API. The system prompt is not exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAgent {
    /// Agent ID, used in `/api/agents/{id}/ask`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Model the agent runs on.
    pub model: String,
    /// One-line description.
    pub description: String,
    /// Tools the agent may call.
    pub tools: Vec<String>,
}

impl From<AgentDefinition> for ApiAgent {
    fn from(agent: AgentDefinition) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            model: agent.model,
            description: agent.description,
            tools: agent.tools,
        }
    }
}

/// Request body for `POST /api/agents/{agent}/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// The user's message.
    pub question: String,
    /// Session to continue. A new session is started when absent or
    /// unknown.
    pub session_id: Option<String>,
}

/// Query parameters for the locations endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationQueryParams {
    /// Strategy label, e.g. `Rally the Base`.
    pub strategy: Option<String>,
    /// Popularity status label.
    pub popularity_status: Option<String>,
    /// Base popularity status label.
    pub base_popularity_status: Option<String>,
    /// Maximum number of locations returned.
    pub limit: Option<usize>,
}

/// A campaign location as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLocation {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Voter affinity in `[0, 1]`.
    pub affinity: f64,
    /// Candidate popularity in `[0, 1]`.
    pub popularity: f64,
    /// Targeting strategy.
    pub strategy: Strategy,
    /// Segment label.
    pub segment: String,
    /// Popularity relative to the opponent.
    pub popularity_status: PopularityStatus,
    /// Popularity relative to the party base.
    pub base_popularity_status: BasePopularityStatus,
}

impl From<&CampaignLocationRecord> for ApiLocation {
    fn from(record: &CampaignLocationRecord) -> Self {
        Self {
            latitude: record.latitude,
            longitude: record.longitude,
            affinity: record.affinity,
            popularity: record.popularity,
            strategy: record.strategy,
            segment: record.segment.clone(),
            popularity_status: record.popularity_status,
            base_popularity_status: record.base_popularity_status,
        }
    }
}

/// Response of the locations endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLocations {
    /// Description of the filter applied.
    pub filter: String,
    /// Number of matching locations before `limit`.
    pub total_count: usize,
    /// Matching locations, in file order.
    pub locations: Vec<ApiLocation>,
}
